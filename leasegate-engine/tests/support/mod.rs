//! Shared test helpers: an in-process fake Nomad ACL store.

#![allow(dead_code)]

use async_trait::async_trait;
use leasegate_engine::{Backend, BackendConfig, Overrides, WriteConfigRequest, WriteRoleRequest};
use leasegate_nomad::{
    AclPolicy, AclToken, ClusterClient, CreateTokenRequest, DeleteOutcome, NomadError,
    NomadResult, TokenType,
};
use leasegate_storage::InMemoryStorage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tokio::sync::Mutex;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "admin";
pub const ADDRESS: &str = "http://x";

/// Stateful stand-in for a Nomad cluster with ACLs enabled.
#[derive(Default)]
pub struct FakeCluster {
    tokens: Mutex<HashMap<String, AclToken>>,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_creates: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub seen_addresses: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.lock().await.len()
    }

    fn authorize(admin_token: &str) -> NomadResult<()> {
        if admin_token == ADMIN_TOKEN {
            Ok(())
        } else {
            Err(NomadError::Status {
                status: 403,
                message: "Permission denied".into(),
            })
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn bootstrap(&self, _address: &str) -> NomadResult<AclToken> {
        Ok(AclToken {
            accessor_id: Uuid::new_v4().to_string(),
            secret_id: ADMIN_TOKEN.into(),
            name: "Bootstrap Token".into(),
            token_type: TokenType::Management,
            policies: None,
            global: true,
            create_time: None,
        })
    }

    async fn create_token(
        &self,
        address: &str,
        admin_token: &str,
        request: &CreateTokenRequest,
    ) -> NomadResult<AclToken> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_addresses.lock().await.push(address.to_string());
        Self::authorize(admin_token)?;
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(NomadError::Status {
                status: 500,
                message: format!("rpc error: no leader (token {admin_token})"),
            });
        }
        let token = AclToken {
            accessor_id: Uuid::new_v4().to_string(),
            secret_id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            token_type: request.token_type,
            policies: Some(request.policies.clone()),
            global: request.global,
            create_time: Some(chrono::Utc::now()),
        };
        self.tokens
            .lock()
            .await
            .insert(token.accessor_id.clone(), token.clone());
        Ok(token)
    }

    async fn lookup_self(&self, _address: &str, secret_id: &str) -> NomadResult<AclToken> {
        self.tokens
            .lock()
            .await
            .values()
            .find(|t| t.secret_id == secret_id)
            .cloned()
            .ok_or_else(|| NomadError::Status {
                status: 403,
                message: "ACL token not found".into(),
            })
    }

    async fn read_token(
        &self,
        _address: &str,
        admin_token: &str,
        accessor_id: &str,
    ) -> NomadResult<AclToken> {
        Self::authorize(admin_token)?;
        self.tokens
            .lock()
            .await
            .get(accessor_id)
            .cloned()
            .ok_or_else(|| NomadError::NotFound(accessor_id.to_string()))
    }

    async fn delete_token(
        &self,
        _address: &str,
        admin_token: &str,
        accessor_id: &str,
    ) -> NomadResult<DeleteOutcome> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Self::authorize(admin_token)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(NomadError::Status {
                status: 500,
                message: "raft apply failed".into(),
            });
        }
        match self.tokens.lock().await.remove(accessor_id) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn upsert_policy(
        &self,
        _address: &str,
        admin_token: &str,
        _policy: &AclPolicy,
    ) -> NomadResult<()> {
        Self::authorize(admin_token)
    }
}

/// Routes engine logs to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn backend(cluster: Arc<FakeCluster>) -> Backend {
    init_tracing();
    Backend::factory(
        BackendConfig::default(),
        Arc::new(InMemoryStorage::new()),
        cluster,
    )
}

pub fn no_overrides() -> Overrides {
    Overrides::default()
}

pub fn access_request(max_token_length: Option<i64>) -> WriteConfigRequest {
    WriteConfigRequest {
        address: ADDRESS.into(),
        token: ADMIN_TOKEN.into(),
        max_token_length,
    }
}

pub fn role_request(policies: &[&str], lease: &str) -> WriteRoleRequest {
    WriteRoleRequest {
        policies: policies.iter().map(|p| p.to_string()).collect(),
        lease: lease.into(),
        ..Default::default()
    }
}

/// Backend with `config/access` and role `test` (`policy`, 6h) written.
pub async fn configured_backend(cluster: Arc<FakeCluster>) -> Backend {
    let backend = backend(cluster);
    backend
        .store()
        .write_config(access_request(None))
        .await
        .unwrap();
    backend
        .store()
        .write_role("test", role_request(&["policy"], "6h"))
        .await
        .unwrap();
    backend
}
