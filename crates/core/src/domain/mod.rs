// Domain Layer - Pure business entities and rules

pub mod error;
pub mod feedback;
pub mod job;
pub mod jurisdiction;
pub mod portal;
pub mod record;
pub mod submission;
pub mod target_group;

// Re-exports
pub use error::DomainError;
pub use feedback::{ErrorRow, Severity};
pub use job::{JobId, JobStatus, SubmissionJob};
pub use jurisdiction::{
    ArtifactFormat, ArtifactLayout, JurisdictionDescriptor, PortalLayout, RowNumbering,
};
pub use portal::{PortalConfig, PortalConfigs, PortalCredentials};
pub use record::{QueueRecord, RecordId, RecordStatus, RecordTransition};
pub use submission::{Address, Employee, Employer, Screening, SubmissionRecord};
pub use target_group::TargetGroup;
