//! Resource services for files and notes.
//!
//! Services own the lifecycle rules (validation, counters, blob/record
//! ordering). The HTTP layer only extracts input and maps [`VaultError`]
//! to status codes.

pub mod files;
pub mod notes;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    MissingInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl From<diesel::result::Error> for VaultError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => VaultError::NotFound("record not found".into()),
            other => VaultError::Internal(format!("database error: {other}")),
        }
    }
}

impl From<anyhow::Error> for VaultError {
    fn from(value: anyhow::Error) -> Self {
        VaultError::Internal(format!("{value:#}"))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(value: std::io::Error) -> Self {
        VaultError::Internal(value.to_string())
    }
}
