//! Backend configuration and per-call overrides.

use crate::naming::DEFAULT_MAX_TOKEN_NAME_LENGTH;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const ENV_ADDRESS: &str = "NOMAD_ADDR";
pub const ENV_TOKEN: &str = "NOMAD_TOKEN";
pub const ENV_MAX_TOKEN_LENGTH: &str = "NOMAD_MAX_TOKEN_LENGTH";

/// Configuration handed to [`crate::Backend::factory`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Token name length used when neither config nor overrides set one.
    pub default_max_token_length: usize,

    /// Timeout for each call to the cluster API (seconds).
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_max_token_length: DEFAULT_MAX_TOKEN_NAME_LENGTH,
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Environment-style overrides, resolved by the host and passed per call.
///
/// `address`/`token` stand in for a missing `config/access` record;
/// `max_token_length` applies only when the stored config sets none.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub address: Option<String>,
    pub token: Option<String>,
    pub max_token_length: Option<usize>,
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("max_token_length", &self.max_token_length)
            .finish()
    }
}

impl Overrides {
    /// Reads `NOMAD_ADDR`, `NOMAD_TOKEN` and `NOMAD_MAX_TOKEN_LENGTH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds overrides from an arbitrary variable source.
    ///
    /// Empty values are treated as unset; a length that is not a positive
    /// integer is ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            address: non_empty(ENV_ADDRESS),
            token: non_empty(ENV_TOKEN),
            max_token_length: non_empty(ENV_MAX_TOKEN_LENGTH)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0),
        }
    }

    pub fn with_max_token_length(mut self, length: usize) -> Self {
        self.max_token_length = Some(length);
        self
    }
}
