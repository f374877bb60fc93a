// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invalid driver state transition: {from} -> {to}")]
    InvalidDriverTransition { from: String, to: String },

    #[error("Retry budget exhausted for job {job_id}: {retry_count}/{max_retries}")]
    RetryBudgetExhausted {
        job_id: String,
        retry_count: i32,
        max_retries: i32,
    },

    #[error("Unknown jurisdiction: {0}")]
    UnknownJurisdiction(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
