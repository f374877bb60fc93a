// Portal Operations Port
//
// One jurisdiction portal's batch-upload workflow, step by step. The driver state machine
// sequences these calls; implementations hold no business classification.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{JurisdictionDescriptor, PortalConfig};
use crate::encoding::Artifact;
use crate::port::browser::{BrowserError, CaptureRef, TableRow};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("unexpected page: {0}")]
    UnexpectedPage(String),

    #[error("session lost: {0}")]
    SessionLost(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Outcome of a login attempt; never an error
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginReport {
    pub authenticated: bool,
    pub landed_url: Option<String>,
    pub diagnostic: Option<String>,
    pub capture: Option<CaptureRef>,
}

impl LoginReport {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            landed_url: None,
            diagnostic: Some(diagnostic.into()),
            capture: None,
        }
    }
}

/// What the portal said once asynchronous validation settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Clean,
    /// Raw rows of the error table across all pages
    Errors(Vec<TableRow>),
}

#[async_trait]
pub trait PortalOperations: Send {
    async fn login(&mut self) -> LoginReport;

    /// Open the batch import page, attach the artifact and trigger the import
    async fn stage_upload(&mut self, artifact: &Artifact) -> Result<(), PortalError>;

    /// Wait (bounded) for validation to settle and read the result
    async fn await_validation(&mut self) -> Result<ValidationOutcome, PortalError>;

    /// Delete the staged batch, confirming the portal's prompt
    async fn delete_batch(&mut self) -> Result<(), PortalError>;

    /// Submit a clean batch; returns the confirmation number(s)
    async fn confirm_batch(&mut self) -> Result<Vec<String>, PortalError>;

    /// Best-effort screenshot
    async fn capture(&mut self, label: &str) -> Option<CaptureRef>;

    async fn close(&mut self);
}

#[async_trait]
pub trait PortalSessionFactory: Send + Sync {
    /// Open a fresh session for one job; sessions are never shared
    async fn open(
        &self,
        descriptor: &'static JurisdictionDescriptor,
        config: &PortalConfig,
    ) -> Result<Box<dyn PortalOperations>, PortalError>;
}
