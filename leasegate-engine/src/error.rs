//! Broker error types.

use leasegate_nomad::NomadError;
use leasegate_storage::StorageError;
use thiserror::Error;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Failures reported to the host dispatcher.
///
/// Messages may name roles and operations but never carry the
/// administrative token or a minted secret.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("access configuration not set")]
    NotConfigured,

    #[error("unknown role: {0}")]
    NotFound(String),

    #[error("invalid lease: {0}")]
    InvalidLease(String),

    #[error("lease error: {0}")]
    Lease(String),

    #[error("upstream {operation} failed: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl BrokerError {
    /// Wraps a remote failure, scrubbing any secret that leaked into its text.
    pub(crate) fn upstream(operation: &'static str, err: &NomadError, secrets: &[&str]) -> Self {
        let mut message = err.to_string();
        for secret in secrets.iter().filter(|s| !s.is_empty()) {
            message = message.replace(secret, "[redacted]");
        }
        BrokerError::Upstream { operation, message }
    }
}
