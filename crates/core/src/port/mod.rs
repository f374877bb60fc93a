// Port Layer - Interfaces for external dependencies

pub mod browser;
pub mod id_provider; // For deterministic testing
pub mod job_store;
pub mod notifier;
pub mod portal;
pub mod record_source;
pub mod submission_driver;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use browser::{BrowserError, BrowserLauncher, BrowserSession, CaptureRef, TableRow};
pub use id_provider::{IdProvider, UuidProvider};
pub use job_store::JobStore;
pub use notifier::{JobNotification, Notifier, NotifyError};
pub use portal::{LoginReport, PortalError, PortalOperations, PortalSessionFactory, ValidationOutcome};
pub use record_source::RecordSource;
pub use submission_driver::{DriverRequest, DriverResult, RejectedRow, ReportedError, SubmissionDriver};
pub use time_provider::{SystemTimeProvider, TimeProvider};
pub use transaction::{JobStoreTransaction, Transaction, TransactionalJobStore};
