// Jurisdiction Registry
//
// Every per-state quirk (artifact layout, date pattern, ceilings, portal page layout,
// error-table numbering, signer rejection wording) lives here so the encoder and the
// driver stay jurisdiction agnostic.

use crate::domain::error::{DomainError, Result};
use crate::encoding::layouts::{
    Column, Field, FixedColumn, AZ_COLUMNS, FL_COLUMNS, FL_RECORD_LEN, NY_ELEMENTS, TX_COLUMNS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Delimited,
    FixedWidth,
    Xml,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Delimited => "csv",
            ArtifactFormat::FixedWidth => "txt",
            ArtifactFormat::Xml => "xml",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ArtifactLayout {
    Delimited {
        delimiter: char,
        columns: &'static [Column],
    },
    FixedWidth {
        record_len: usize,
        columns: &'static [FixedColumn],
    },
    Xml {
        root: &'static str,
        record: &'static str,
        elements: &'static [Column],
    },
}

impl ArtifactLayout {
    pub fn format(&self) -> ArtifactFormat {
        match self {
            ArtifactLayout::Delimited { .. } => ArtifactFormat::Delimited,
            ArtifactLayout::FixedWidth { .. } => ArtifactFormat::FixedWidth,
            ArtifactLayout::Xml { .. } => ArtifactFormat::Xml,
        }
    }
}

/// How the portal's error table numbers rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowNumbering {
    /// Row 1 is the first record
    DataRows,
    /// Row 1 is the header line, so the first record is row 2
    HeaderInclusive,
}

impl RowNumbering {
    /// Zero-based record index for a portal row number
    pub fn record_index(&self, row_number: u32) -> Option<usize> {
        let first = match self {
            RowNumbering::DataRows => 1,
            RowNumbering::HeaderInclusive => 2,
        };
        row_number.checked_sub(first).map(|i| i as usize)
    }
}

/// Page paths and CSS selectors of a portal's batch-upload workflow
#[derive(Debug, Clone, Copy)]
pub struct PortalLayout {
    pub login_path: &'static str,
    pub username_input: &'static str,
    pub password_input: &'static str,
    /// Terms-of-use checkbox that must be ticked before signing in
    pub agreement_checkbox: Option<&'static str>,
    pub login_button: &'static str,
    /// Regex over the current URL proving we reached the dashboard
    pub dashboard_url_pattern: &'static str,

    pub import_path: &'static str,
    pub file_input: &'static str,
    pub import_button: &'static str,
    /// Present once validation finished with errors
    pub results_table: &'static str,
    pub results_rows: &'static str,
    /// Present once validation finished without errors
    pub clean_marker: &'static str,
    pub next_page: &'static str,

    pub delete_button: &'static str,
    pub delete_confirm_button: &'static str,

    pub confirm_button: &'static str,
    pub confirmation_number: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct JurisdictionDescriptor {
    pub code: &'static str,
    pub name: &'static str,
    pub layout: ArtifactLayout,
    /// chrono format string
    pub date_pattern: &'static str,
    pub record_ceiling: usize,
    /// Fields that must be present before a record may be encoded
    pub required: &'static [Field],
    pub portal: PortalLayout,
    /// Lowercase substrings identifying a "signer not authorized" rejection
    pub signer_markers: &'static [&'static str],
    pub row_numbering: RowNumbering,
}

impl JurisdictionDescriptor {
    pub fn format(&self) -> ArtifactFormat {
        self.layout.format()
    }

    /// True when the message only objects to the authorized signer
    pub fn is_signer_rejection(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.signer_markers.iter().any(|m| message.contains(m))
    }
}

const COMMON_REQUIRED: &[Field] = &[
    Field::FirstName,
    Field::LastName,
    Field::Ssn,
    Field::DateOfBirth,
    Field::AddressLine1,
    Field::City,
    Field::State,
    Field::Zip,
    Field::HiredDate,
    Field::StartedDate,
    Field::Form8850SignedDate,
    Field::EmployerName,
    Field::EmployerEin,
    Field::EmployerAddress,
];

const AZ_REQUIRED: &[Field] = &[
    Field::FirstName,
    Field::LastName,
    Field::Ssn,
    Field::DateOfBirth,
    Field::AddressLine1,
    Field::City,
    Field::State,
    Field::Zip,
    Field::GaveInformationDate,
    Field::OfferedDate,
    Field::HiredDate,
    Field::StartedDate,
    Field::StartingWage,
    Field::JobTitle,
    Field::Form8850SignedDate,
    Field::EmployerName,
    Field::EmployerEin,
    Field::EmployerAddress,
    Field::EmployerCity,
    Field::EmployerState,
    Field::EmployerZip,
];

const SIGNER_MARKERS: &[&str] = &[
    "signer not authorized",
    "signer is not authorized",
    "not an authorized signer",
    "unauthorized signer",
    "signatory not on file",
];

const STANDARD_PORTAL: PortalLayout = PortalLayout {
    login_path: "/login",
    username_input: "input#username",
    password_input: "input#password",
    agreement_checkbox: Some("input#agree-terms"),
    login_button: "button[type=submit]",
    dashboard_url_pattern: r"/(dashboard|home)(/|\?|$)",
    import_path: "/batch/import",
    file_input: "input[type=file]",
    import_button: "button#import",
    results_table: "table#validation-results",
    results_rows: "table#validation-results tbody tr",
    clean_marker: ".validation-success",
    next_page: "a.next-page:not(.disabled)",
    delete_button: "button#delete-batch",
    delete_confirm_button: "button#confirm-delete",
    confirm_button: "button#submit-batch",
    confirmation_number: ".confirmation-number",
};

static REGISTRY: &[JurisdictionDescriptor] = &[
    JurisdictionDescriptor {
        code: "AZ",
        name: "Arizona",
        layout: ArtifactLayout::Delimited {
            delimiter: ',',
            columns: AZ_COLUMNS,
        },
        date_pattern: "%m/%d/%Y",
        record_ceiling: 500,
        required: AZ_REQUIRED,
        portal: PortalLayout {
            dashboard_url_pattern: r"/employer/dashboard",
            import_path: "/employer/wotc/batch-upload",
            ..STANDARD_PORTAL
        },
        signer_markers: SIGNER_MARKERS,
        row_numbering: RowNumbering::HeaderInclusive,
    },
    JurisdictionDescriptor {
        code: "TX",
        name: "Texas",
        layout: ArtifactLayout::Delimited {
            delimiter: ',',
            columns: TX_COLUMNS,
        },
        date_pattern: "%m/%d/%Y",
        record_ceiling: 250,
        required: COMMON_REQUIRED,
        portal: PortalLayout {
            agreement_checkbox: None,
            ..STANDARD_PORTAL
        },
        signer_markers: SIGNER_MARKERS,
        row_numbering: RowNumbering::DataRows,
    },
    JurisdictionDescriptor {
        code: "NY",
        name: "New York",
        layout: ArtifactLayout::Xml {
            root: "WotcBatch",
            record: "Applicant",
            elements: NY_ELEMENTS,
        },
        date_pattern: "%Y-%m-%d",
        record_ceiling: 1000,
        required: COMMON_REQUIRED,
        portal: STANDARD_PORTAL,
        signer_markers: SIGNER_MARKERS,
        row_numbering: RowNumbering::DataRows,
    },
    JurisdictionDescriptor {
        code: "FL",
        name: "Florida",
        layout: ArtifactLayout::FixedWidth {
            record_len: FL_RECORD_LEN,
            columns: FL_COLUMNS,
        },
        date_pattern: "%Y%m%d",
        record_ceiling: 300,
        required: COMMON_REQUIRED,
        portal: PortalLayout {
            dashboard_url_pattern: r"/wotc/home",
            ..STANDARD_PORTAL
        },
        signer_markers: SIGNER_MARKERS,
        row_numbering: RowNumbering::DataRows,
    },
];

/// Look up a descriptor by (case-insensitive) jurisdiction code
pub fn lookup(code: &str) -> Option<&'static JurisdictionDescriptor> {
    REGISTRY.iter().find(|d| d.code.eq_ignore_ascii_case(code.trim()))
}

pub fn require(code: &str) -> Result<&'static JurisdictionDescriptor> {
    lookup(code).ok_or_else(|| DomainError::UnknownJurisdiction(code.to_string()))
}

pub fn all() -> &'static [JurisdictionDescriptor] {
    REGISTRY
}
