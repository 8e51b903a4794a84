//! Configuration store: the access config, lease defaults and roles.
//!
//! Every write is validated here before touching storage, so a rejected
//! write never reaches the cluster or leaves a partial record behind.

use crate::config::Overrides;
use crate::error::{BrokerError, BrokerResult};
use crate::naming::resolve_max_token_length;
use crate::types::{
    AccessConfig, AccessConfigView, LeaseConfig, Role, WriteConfigRequest,
    WriteLeaseConfigRequest, WriteRoleRequest,
};
use leasegate_nomad::{parse_address, TokenType};
use leasegate_storage::{Storage, StorageExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const ACCESS_CONFIG_KEY: &str = "config/access";
const LEASE_CONFIG_KEY: &str = "config/lease";
const ROLE_PREFIX: &str = "role/";

/// Connection parameters in force for a single call.
#[derive(Clone)]
pub struct ResolvedAccess {
    pub address: String,
    pub token: String,
    pub max_token_length: usize,
}

impl fmt::Debug for ResolvedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAccess")
            .field("address", &self.address)
            .field("token", &"[redacted]")
            .field("max_token_length", &self.max_token_length)
            .finish()
    }
}

/// Role names: word characters, with `-` and `.` allowed in the interior.
pub fn is_valid_role_name(name: &str) -> bool {
    let edge_ok = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let (Some(first), Some(last)) = (name.chars().next(), name.chars().last()) else {
        return false;
    };
    edge_ok(first)
        && edge_ok(last)
        && name
            .chars()
            .all(|c| edge_ok(c) || c == '-' || c == '.')
}

fn parse_duration(field: &str, raw: &str) -> BrokerResult<Duration> {
    let duration = humantime::parse_duration(raw.trim())
        .map_err(|e| BrokerError::Validation(format!("{field}: {e}")))?;
    if duration.is_zero() {
        return Err(BrokerError::Validation(format!("{field} must be positive")));
    }
    Ok(duration)
}

fn parse_optional_duration(field: &str, raw: Option<&str>) -> BrokerResult<Option<Duration>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_duration(field, raw).map(Some),
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct ConfigStore {
    storage: Arc<dyn Storage>,
}

impl ConfigStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    // ── Access config ──

    pub async fn write_config(&self, request: WriteConfigRequest) -> BrokerResult<()> {
        let address = request.address.trim();
        if address.is_empty() {
            return Err(BrokerError::Validation("address is required".into()));
        }
        parse_address(address).map_err(|e| BrokerError::Validation(e.to_string()))?;
        if request.token.is_empty() {
            return Err(BrokerError::Validation("token is required".into()));
        }
        let max_token_length = match request.max_token_length {
            Some(n) if n <= 0 => {
                return Err(BrokerError::Validation(
                    "max_token_length must be a positive integer".into(),
                ));
            }
            Some(n) => Some(usize::try_from(n).map_err(|_| {
                BrokerError::Validation("max_token_length is out of range".into())
            })?),
            None => None,
        };

        let config = AccessConfig {
            address: address.to_string(),
            token: request.token,
            max_token_length,
        };
        self.storage.put_json(ACCESS_CONFIG_KEY, &config).await?;
        info!("wrote access config for {}", config.address);
        Ok(())
    }

    /// Returns the stored record, token included. Never hand this to a caller.
    pub async fn access_config(&self) -> BrokerResult<Option<AccessConfig>> {
        Ok(self.storage.get_json(ACCESS_CONFIG_KEY).await?)
    }

    /// Resolves address, token and name length for one call.
    ///
    /// A stored record wins outright; override address/token are used only
    /// when no record exists.
    pub async fn resolve_access(
        &self,
        overrides: &Overrides,
        default_max_token_length: usize,
    ) -> BrokerResult<ResolvedAccess> {
        let (address, token, configured_length) = match self.access_config().await? {
            Some(config) => (config.address, config.token, config.max_token_length),
            None => match &overrides.address {
                Some(address) => {
                    debug!("no stored access config, using override address");
                    (
                        address.clone(),
                        overrides.token.clone().unwrap_or_default(),
                        None,
                    )
                }
                None => return Err(BrokerError::NotConfigured),
            },
        };

        Ok(ResolvedAccess {
            address,
            token,
            max_token_length: resolve_max_token_length(
                configured_length,
                overrides.max_token_length,
                default_max_token_length,
            ),
        })
    }

    pub async fn read_config(
        &self,
        overrides: &Overrides,
        default_max_token_length: usize,
    ) -> BrokerResult<AccessConfigView> {
        let resolved = self
            .resolve_access(overrides, default_max_token_length)
            .await?;
        Ok(AccessConfigView {
            address: resolved.address,
            max_token_length: resolved.max_token_length,
        })
    }

    // ── Lease config ──

    pub async fn write_lease_config(
        &self,
        request: WriteLeaseConfigRequest,
    ) -> BrokerResult<LeaseConfig> {
        let config = LeaseConfig {
            ttl: parse_optional_duration("ttl", request.ttl.as_deref())?,
            max_ttl: parse_optional_duration("max_ttl", request.max_ttl.as_deref())?,
        };
        if let (Some(ttl), Some(max_ttl)) = (config.ttl, config.max_ttl) {
            if max_ttl < ttl {
                return Err(BrokerError::Validation(
                    "max_ttl must not be less than ttl".into(),
                ));
            }
        }
        self.storage.put_json(LEASE_CONFIG_KEY, &config).await?;
        info!("wrote lease config: {config:?}");
        Ok(config)
    }

    /// Lease defaults; empty when never written.
    pub async fn lease_config(&self) -> BrokerResult<LeaseConfig> {
        Ok(self
            .storage
            .get_json(LEASE_CONFIG_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn delete_lease_config(&self) -> BrokerResult<()> {
        self.storage.delete(LEASE_CONFIG_KEY).await?;
        Ok(())
    }

    // ── Roles ──

    pub async fn write_role(&self, name: &str, request: WriteRoleRequest) -> BrokerResult<Role> {
        if !is_valid_role_name(name) {
            return Err(BrokerError::Validation(format!("invalid role name: {name:?}")));
        }

        match request.token_type {
            TokenType::Client if request.policies.is_empty() => {
                return Err(BrokerError::Validation(
                    "client roles require at least one policy".into(),
                ));
            }
            TokenType::Management if !request.policies.is_empty() => {
                return Err(BrokerError::Validation(
                    "management roles must not set policies".into(),
                ));
            }
            _ => {}
        }

        if request.lease.trim().is_empty() {
            return Err(BrokerError::Validation("lease is required".into()));
        }
        let lease = parse_duration("lease", &request.lease)?;
        let max_ttl = parse_optional_duration("max_ttl", request.max_ttl.as_deref())?;
        if max_ttl.is_some_and(|max| max < lease) {
            return Err(BrokerError::Validation(
                "max_ttl must not be less than lease".into(),
            ));
        }

        let role = Role {
            policies: request.policies,
            lease,
            max_ttl,
            token_type: request.token_type,
            global: request.global,
        };
        self.storage
            .put_json(&format!("{ROLE_PREFIX}{name}"), &role)
            .await?;
        info!("wrote role {name}");
        Ok(role)
    }

    pub async fn find_role(&self, name: &str) -> BrokerResult<Option<Role>> {
        Ok(self
            .storage
            .get_json(&format!("{ROLE_PREFIX}{name}"))
            .await?)
    }

    pub async fn read_role(&self, name: &str) -> BrokerResult<Role> {
        self.find_role(name)
            .await?
            .ok_or_else(|| BrokerError::NotFound(name.to_string()))
    }

    /// Removes a role. Tokens already issued under it are unaffected.
    pub async fn delete_role(&self, name: &str) -> BrokerResult<()> {
        self.storage.delete(&format!("{ROLE_PREFIX}{name}")).await?;
        info!("deleted role {name}");
        Ok(())
    }

    pub async fn list_roles(&self) -> BrokerResult<Vec<String>> {
        Ok(self.storage.list(ROLE_PREFIX).await?)
    }
}
