//! Nomad client error types.

use thiserror::Error;

/// Result type for Nomad API operations.
pub type NomadResult<T> = Result<T, NomadError>;

/// Errors returned by the Nomad ACL API client.
#[derive(Debug, Error)]
pub enum NomadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Nomad API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl NomadError {
    /// True when the remote side reported the target as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NomadError::NotFound(_))
    }
}
