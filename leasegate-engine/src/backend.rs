//! Request dispatch.
//!
//! Hosts either build an [`Operation`] directly or decode one from an
//! `(OperationKind, path, body)` triple with [`Operation::decode`]. Once
//! decoded, every request is a typed value and [`Backend::handle`] is a
//! single match over it.

use crate::config::{BackendConfig, Overrides};
use crate::engine::{CredentialEngine, RevokeOutcome};
use crate::error::{BrokerError, BrokerResult};
use crate::store::{is_valid_role_name, ConfigStore};
use crate::types::{
    AccessConfigView, CredentialData, IssuedCredential, Lease, LeaseConfig, Role,
    WriteConfigRequest, WriteLeaseConfigRequest, WriteRoleRequest,
};
use leasegate_nomad::{ClusterClient, NomadClient};
use leasegate_storage::Storage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Verb of an inbound host request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Update,
    Delete,
    List,
    Renew,
    Revoke,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::List => write!(f, "list"),
            OperationKind::Renew => write!(f, "renew"),
            OperationKind::Revoke => write!(f, "revoke"),
        }
    }
}

/// Body of a renew request.
#[derive(Clone, Debug, Deserialize)]
pub struct RenewRequest {
    pub lease: Lease,
    #[serde(default, with = "humantime_serde")]
    pub increment: Option<Duration>,
}

/// Body of a revoke request.
#[derive(Clone, Debug, Deserialize)]
pub struct RevokeRequest {
    pub lease: Lease,
}

/// Every operation the backend serves.
#[derive(Clone, Debug)]
pub enum Operation {
    WriteConfig(WriteConfigRequest),
    ReadConfig,
    WriteLeaseConfig(WriteLeaseConfigRequest),
    ReadLeaseConfig,
    DeleteLeaseConfig,
    WriteRole { name: String, request: WriteRoleRequest },
    ReadRole { name: String },
    DeleteRole { name: String },
    ListRoles,
    IssueCredential { role: String },
    RenewLease { lease: Lease, increment: Option<Duration> },
    RevokeLease { lease: Lease },
}

fn decode_body<T: DeserializeOwned + Default>(body: Option<serde_json::Value>) -> BrokerResult<T> {
    match body {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| BrokerError::Validation(format!("malformed request body: {e}"))),
        None => Ok(T::default()),
    }
}

fn decode_required<T: DeserializeOwned>(body: Option<serde_json::Value>) -> BrokerResult<T> {
    let value = body.ok_or_else(|| BrokerError::InvalidLease("missing lease".into()))?;
    serde_json::from_value(value).map_err(|e| BrokerError::InvalidLease(e.to_string()))
}

fn role_segment(name: &str) -> BrokerResult<String> {
    if is_valid_role_name(name) {
        Ok(name.to_string())
    } else {
        Err(BrokerError::Validation(format!("invalid role name: {name:?}")))
    }
}

impl Operation {
    /// Decodes a path-addressed host request.
    ///
    /// Paths: `config/access`, `config/lease`, `role/` (list), `role/<name>`,
    /// `creds/<name>`. Renew and revoke ignore the path and read the lease
    /// from the body.
    pub fn decode(
        kind: OperationKind,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> BrokerResult<Self> {
        use OperationKind::*;

        match kind {
            Renew => {
                let request: RenewRequest = decode_required(body)?;
                return Ok(Operation::RenewLease {
                    lease: request.lease,
                    increment: request.increment,
                });
            }
            Revoke => {
                let request: RevokeRequest = decode_required(body)?;
                return Ok(Operation::RevokeLease {
                    lease: request.lease,
                });
            }
            _ => {}
        }

        let path = path.trim_matches('/');
        let operation = match (kind, path.split_once('/')) {
            (Update, Some(("config", "access"))) => Operation::WriteConfig(decode_body(body)?),
            (Read, Some(("config", "access"))) => Operation::ReadConfig,
            (Update, Some(("config", "lease"))) => {
                Operation::WriteLeaseConfig(decode_body(body)?)
            }
            (Read, Some(("config", "lease"))) => Operation::ReadLeaseConfig,
            (Delete, Some(("config", "lease"))) => Operation::DeleteLeaseConfig,
            (List, None) if path == "role" => Operation::ListRoles,
            (Update, Some(("role", name))) => Operation::WriteRole {
                name: role_segment(name)?,
                request: decode_body(body)?,
            },
            (Read, Some(("role", name))) => Operation::ReadRole {
                name: role_segment(name)?,
            },
            (Delete, Some(("role", name))) => Operation::DeleteRole {
                name: role_segment(name)?,
            },
            (Read, Some(("creds", name))) => Operation::IssueCredential {
                role: role_segment(name)?,
            },
            _ => return Err(BrokerError::Unsupported(format!("{kind} {path}"))),
        };
        Ok(operation)
    }
}

/// Result of a handled operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Empty,
    Config(AccessConfigView),
    LeaseConfig(LeaseConfig),
    Role(Role),
    Roles(Vec<String>),
    Credential(IssuedCredential),
    Renewed(Lease),
    Revoked(RevokeOutcome),
}

#[derive(Serialize)]
struct RoleList<'a> {
    keys: &'a [String],
}

impl Response {
    /// User-visible payload. Credential responses expose only
    /// `secret_id`/`accessor_id`; the lease stays with the host.
    pub fn data(&self) -> BrokerResult<Option<serde_json::Value>> {
        let value = match self {
            Response::Empty | Response::Revoked(_) | Response::Renewed(_) => return Ok(None),
            Response::Config(view) => serde_json::to_value(view)?,
            Response::LeaseConfig(config) => serde_json::to_value(config)?,
            Response::Role(role) => serde_json::to_value(role)?,
            Response::Roles(keys) => serde_json::to_value(RoleList { keys })?,
            Response::Credential(issued) => serde_json::to_value(&issued.data)?,
        };
        Ok(Some(value))
    }

    /// Lease to be tracked by the host, for issuance and renewal responses.
    pub fn lease(&self) -> Option<&Lease> {
        match self {
            Response::Credential(issued) => Some(&issued.lease),
            Response::Renewed(lease) => Some(lease),
            _ => None,
        }
    }

    pub fn credential(&self) -> Option<&CredentialData> {
        match self {
            Response::Credential(issued) => Some(&issued.data),
            _ => None,
        }
    }
}

/// The broker as seen by a host: storage plus cluster, behind one `handle`.
pub struct Backend {
    config: BackendConfig,
    store: ConfigStore,
    engine: CredentialEngine,
}

impl Backend {
    /// Builds a backend from its collaborators.
    pub fn factory(
        config: BackendConfig,
        storage: Arc<dyn Storage>,
        cluster: Arc<dyn ClusterClient>,
    ) -> Self {
        let store = ConfigStore::new(storage);
        let engine = CredentialEngine::new(
            store.clone(),
            cluster,
            config.default_max_token_length,
        );
        Self {
            config,
            store,
            engine,
        }
    }

    /// Builds a backend talking to Nomad over HTTP.
    pub fn with_nomad(config: BackendConfig, storage: Arc<dyn Storage>) -> BrokerResult<Self> {
        let client = NomadClient::new(config.request_timeout()).map_err(|e| {
            BrokerError::Upstream {
                operation: "build client",
                message: e.to_string(),
            }
        })?;
        Ok(Self::factory(config, storage, Arc::new(client)))
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn engine(&self) -> &CredentialEngine {
        &self.engine
    }

    /// Decodes and handles a path-addressed request.
    pub async fn handle_request(
        &self,
        kind: OperationKind,
        path: &str,
        body: Option<serde_json::Value>,
        overrides: &Overrides,
    ) -> BrokerResult<Response> {
        let operation = Operation::decode(kind, path, body)?;
        self.handle(operation, overrides).await
    }

    pub async fn handle(
        &self,
        operation: Operation,
        overrides: &Overrides,
    ) -> BrokerResult<Response> {
        let default_length = self.config.default_max_token_length;
        match operation {
            Operation::WriteConfig(request) => {
                self.store.write_config(request).await?;
                Ok(Response::Empty)
            }
            Operation::ReadConfig => Ok(Response::Config(
                self.store.read_config(overrides, default_length).await?,
            )),
            Operation::WriteLeaseConfig(request) => Ok(Response::LeaseConfig(
                self.store.write_lease_config(request).await?,
            )),
            Operation::ReadLeaseConfig => {
                Ok(Response::LeaseConfig(self.store.lease_config().await?))
            }
            Operation::DeleteLeaseConfig => {
                self.store.delete_lease_config().await?;
                Ok(Response::Empty)
            }
            Operation::WriteRole { name, request } => {
                self.store.write_role(&name, request).await?;
                Ok(Response::Empty)
            }
            Operation::ReadRole { name } => Ok(Response::Role(self.store.read_role(&name).await?)),
            Operation::DeleteRole { name } => {
                self.store.delete_role(&name).await?;
                Ok(Response::Empty)
            }
            Operation::ListRoles => Ok(Response::Roles(self.store.list_roles().await?)),
            Operation::IssueCredential { role } => Ok(Response::Credential(
                self.engine.issue(&role, overrides).await?,
            )),
            Operation::RenewLease { lease, increment } => {
                let ttl = self.engine.renew(&lease, increment).await?;
                debug!("lease renewed, new ttl {ttl:?}");
                Ok(Response::Renewed(Lease { ttl, ..lease }))
            }
            Operation::RevokeLease { lease } => Ok(Response::Revoked(
                self.engine.revoke(&lease, overrides).await?,
            )),
        }
    }
}
