//! Credential lifecycle: issue, renew, revoke.
//!
//! The engine keeps no state between calls. Issuance reads config and role
//! from the store; renew and revoke work entirely from the lease envelope
//! the host hands back, plus the current config.

use crate::config::Overrides;
use crate::error::{BrokerError, BrokerResult};
use crate::naming::generate_name;
use crate::store::ConfigStore;
use crate::types::{CredentialData, IssuedCredential, Lease, LeaseInternal};
use chrono::{DateTime, Utc};
use leasegate_nomad::{ClusterClient, CreateTokenRequest, DeleteOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a revoke. Both variants are success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    /// Token was already gone upstream.
    AlreadyAbsent,
}

pub struct CredentialEngine {
    store: ConfigStore,
    cluster: Arc<dyn ClusterClient>,
    default_max_token_length: usize,
}

impl CredentialEngine {
    pub fn new(
        store: ConfigStore,
        cluster: Arc<dyn ClusterClient>,
        default_max_token_length: usize,
    ) -> Self {
        Self {
            store,
            cluster,
            default_max_token_length,
        }
    }

    /// Mints a new token for `role_name`.
    ///
    /// If the cluster call fails nothing has been recorded locally. A token
    /// the cluster created before failing to answer stays orphaned upstream;
    /// the error is returned rather than retried.
    pub async fn issue(
        &self,
        role_name: &str,
        overrides: &Overrides,
    ) -> BrokerResult<IssuedCredential> {
        let access = self
            .store
            .resolve_access(overrides, self.default_max_token_length)
            .await?;
        let role = self.store.read_role(role_name).await?;

        let token_name = generate_name(role_name, access.max_token_length);
        let request = CreateTokenRequest {
            name: token_name.clone(),
            token_type: role.token_type,
            policies: role.policies.clone(),
            global: role.global,
        };

        let token = self
            .cluster
            .create_token(&access.address, &access.token, &request)
            .await
            .map_err(|e| {
                warn!("token creation for role {role_name} failed: {e}");
                BrokerError::upstream("create token", &e, &[&access.token])
            })?;

        info!(
            "issued token {token_name} for role {role_name} (accessor {})",
            token.accessor_id
        );

        Ok(IssuedCredential {
            data: CredentialData {
                secret_id: token.secret_id,
                accessor_id: token.accessor_id.clone(),
            },
            lease: Lease {
                ttl: role.lease,
                issued_at: Utc::now(),
                internal: LeaseInternal {
                    accessor_id: Some(token.accessor_id),
                    role_name: Some(role_name.to_string()),
                    max_token_length: Some(access.max_token_length),
                },
            },
            token_name,
        })
    }

    /// Computes the TTL granted for a renewal requested now.
    pub async fn renew(
        &self,
        lease: &Lease,
        requested: Option<Duration>,
    ) -> BrokerResult<Duration> {
        self.renew_at(lease, requested, Utc::now()).await
    }

    /// Computes the TTL granted for a renewal requested at `now`.
    ///
    /// The cluster is never contacted. The increment is the requested TTL,
    /// else the backend lease `ttl`, else the role's `lease`. If the role (or,
    /// failing that, the backend lease config) sets a `max_ttl`, the grant is
    /// capped so the lease never outlives `issued_at + max_ttl`.
    pub async fn renew_at(
        &self,
        lease: &Lease,
        requested: Option<Duration>,
        now: DateTime<Utc>,
    ) -> BrokerResult<Duration> {
        lease_accessor(&lease.internal)?;
        let role_name = lease
            .internal
            .role_name
            .as_deref()
            .ok_or_else(|| BrokerError::InvalidLease("missing role_name".into()))?;

        let role = self.store.find_role(role_name).await?.ok_or_else(|| {
            BrokerError::Lease(format!(
                "role {role_name} no longer exists; renewal denied"
            ))
        })?;
        let defaults = self.store.lease_config().await?;

        let increment = requested
            .filter(|d| !d.is_zero())
            .or(defaults.ttl)
            .unwrap_or(role.lease);

        let granted = match role.max_ttl.or(defaults.max_ttl) {
            Some(max_ttl) => {
                let elapsed = (now - lease.issued_at).to_std().unwrap_or_default();
                let remaining = max_ttl.saturating_sub(elapsed);
                if remaining.is_zero() {
                    return Err(BrokerError::Lease(format!(
                        "lease for role {role_name} has reached its max TTL"
                    )));
                }
                increment.min(remaining)
            }
            None => increment,
        };

        debug!("renewed lease for role {role_name}: granted {granted:?}");
        Ok(granted)
    }

    /// Deletes the token behind `lease` upstream.
    ///
    /// Revoking a token that is already gone succeeds, so repeated revokes
    /// of the same lease are safe.
    pub async fn revoke(
        &self,
        lease: &Lease,
        overrides: &Overrides,
    ) -> BrokerResult<RevokeOutcome> {
        let accessor = lease_accessor(&lease.internal)?;
        let access = self
            .store
            .resolve_access(overrides, self.default_max_token_length)
            .await?;

        let outcome = self
            .cluster
            .delete_token(&access.address, &access.token, accessor)
            .await
            .map_err(|e| {
                warn!("revoking token {accessor} failed: {e}");
                BrokerError::upstream("revoke token", &e, &[&access.token])
            })?;

        match outcome {
            DeleteOutcome::Deleted => {
                info!("revoked token {accessor}");
                Ok(RevokeOutcome::Revoked)
            }
            DeleteOutcome::NotFound => {
                info!("token {accessor} already absent upstream, treating as revoked");
                Ok(RevokeOutcome::AlreadyAbsent)
            }
        }
    }
}

fn lease_accessor(internal: &LeaseInternal) -> BrokerResult<&str> {
    internal
        .accessor_id
        .as_deref()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| BrokerError::InvalidLease("missing accessor_id".into()))
}
