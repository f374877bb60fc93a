// Portal validation feedback

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Portals label severities inconsistently; anything unrecognized blocks the batch
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        if label.starts_with("warn") || label == "info" || label == "notice" {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

/// One message from a portal's validation table, tied to an artifact row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorRow {
    pub row_number: u32,
    pub reference_id: String,
    pub field_name: String,
    pub severity: Severity,
    pub message: String,
}

impl ErrorRow {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ErrorRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}", self.row_number)?;
        if !self.reference_id.is_empty() {
            write!(f, " ({})", self.reference_id)?;
        }
        if !self.field_name.is_empty() {
            write!(f, " {}", self.field_name)?;
        }
        write!(f, ": {}", self.message)
    }
}
