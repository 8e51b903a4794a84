//! Nomad ACL API client for leasegate.
//!
//! Thin, stateless wrapper over the four ACL token operations the broker
//! needs (bootstrap, create, lookup, delete) plus policy upsert. Every call
//! takes the cluster address and bearer token explicitly; the client holds
//! no credentials of its own.

pub mod client;
pub mod error;
pub mod types;

pub use client::{parse_address, ClusterClient, NomadClient};
pub use error::{NomadError, NomadResult};
pub use types::*;
