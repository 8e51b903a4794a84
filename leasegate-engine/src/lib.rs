//! Dynamic Nomad token broker.
//!
//! Holds an administrative Nomad token and mints short-lived, role-scoped
//! tokens on demand. Callers never see the administrative token; they get a
//! fresh token, its accessor, and a lease envelope for later renew/revoke.
//!
//! - [`store::ConfigStore`]: access config, lease defaults and roles
//! - [`naming`]: length-bounded token display names
//! - [`engine::CredentialEngine`]: issue / renew / revoke
//! - [`backend::Backend`]: typed operation dispatch for a host

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod naming;
pub mod store;
pub mod types;

pub use backend::{Backend, Operation, OperationKind, Response};
pub use config::{BackendConfig, Overrides};
pub use engine::{CredentialEngine, RevokeOutcome};
pub use error::{BrokerError, BrokerResult};
pub use types::*;
