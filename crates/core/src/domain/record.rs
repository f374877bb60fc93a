// Queue Record Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::job::JobId;

/// Queue record identifier (the upstream submission-ready record ID)
pub type RecordId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Ready,
    InProgress,
    Submitted,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Ready => "READY",
            RecordStatus::InProgress => "IN_PROGRESS",
            RecordStatus::Submitted => "SUBMITTED",
            RecordStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READY" => Ok(RecordStatus::Ready),
            "IN_PROGRESS" => Ok(RecordStatus::InProgress),
            "SUBMITTED" => Ok(RecordStatus::Submitted),
            "FAILED" => Ok(RecordStatus::Failed),
            other => Err(DomainError::ValidationError(format!(
                "unknown record status '{other}'"
            ))),
        }
    }
}

/// Per-record submission bookkeeping
///
/// Bound to at most one non-terminal job through `assigned_job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: RecordId,
    pub assigned_job_id: Option<JobId>,
    pub status: RecordStatus,
    pub failure_count: i32,
    pub last_failure_reason: Option<String>,
    pub updated_at: i64,
}

/// Status change for one bound record, applied together with its job's transition
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTransition {
    pub record_id: RecordId,
    pub status: RecordStatus,
    pub failure_reason: Option<String>,
}

impl RecordTransition {
    pub fn submitted(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            status: RecordStatus::Submitted,
            failure_reason: None,
        }
    }

    pub fn released(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            status: RecordStatus::Ready,
            failure_reason: None,
        }
    }

    pub fn failed(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            status: RecordStatus::Failed,
            failure_reason: Some(reason.into()),
        }
    }
}
