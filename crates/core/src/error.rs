// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] crate::encoding::EncodeError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Errors a retry cannot fix; a job hitting one fails without consuming its retry budget
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AppError::Config(_) | AppError::Encoding(_) | AppError::Validation(_)
        )
    }
}

// Note: sqlx::Error conversion is handled in the infra-sqlite crate
// by mapping to AppError::Database(String)
