mod support;

use leasegate_engine::{
    Backend, BackendConfig, BrokerError, Operation, OperationKind, Overrides, Response,
    RevokeOutcome,
};
use leasegate_nomad::ClusterClient;
use leasegate_storage::InMemoryStorage;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn write_config(backend: &Backend, address: &str) {
    backend
        .handle_request(
            OperationKind::Update,
            "config/access",
            Some(json!({ "address": address, "token": ADMIN_TOKEN })),
            &no_overrides(),
        )
        .await
        .unwrap();
}

async fn write_test_role(backend: &Backend) {
    backend
        .handle_request(
            OperationKind::Update,
            "role/test",
            Some(json!({ "policies": ["policy"], "lease": "6h" })),
            &no_overrides(),
        )
        .await
        .unwrap();
}

// ── Full lifecycle ──

#[tokio::test]
async fn lifecycle_through_request_paths() {
    let cluster = FakeCluster::new();
    let backend = backend(cluster.clone());

    write_config(&backend, ADDRESS).await;
    let read = backend
        .handle_request(OperationKind::Read, "config/access", None, &no_overrides())
        .await
        .unwrap();
    assert_eq!(
        read.data().unwrap(),
        Some(json!({ "address": ADDRESS, "max_token_length": 64 }))
    );

    write_test_role(&backend).await;

    let issued = backend
        .handle_request(OperationKind::Read, "creds/test", None, &no_overrides())
        .await
        .unwrap();
    let credential = issued.credential().unwrap().clone();
    let lease = issued.lease().unwrap().clone();
    assert_eq!(lease.ttl, Duration::from_secs(6 * 3600));

    let data = issued.data().unwrap().unwrap();
    let mut fields: Vec<&str> = data.as_object().unwrap().keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["accessor_id", "secret_id"]);

    let token = cluster
        .lookup_self(ADDRESS, &credential.secret_id)
        .await
        .unwrap();
    assert_eq!(token.accessor_id, credential.accessor_id);

    let renewed = backend
        .handle_request(
            OperationKind::Renew,
            "creds/test",
            Some(json!({ "lease": lease, "increment": "6h" })),
            &no_overrides(),
        )
        .await
        .unwrap();
    assert_eq!(renewed.lease().unwrap().ttl, Duration::from_secs(6 * 3600));
    assert_eq!(renewed.lease().unwrap().internal, lease.internal);

    let revoked = backend
        .handle_request(
            OperationKind::Revoke,
            "creds/test",
            Some(json!({ "lease": lease })),
            &no_overrides(),
        )
        .await
        .unwrap();
    assert_eq!(revoked, Response::Revoked(RevokeOutcome::Revoked));

    let err = cluster
        .read_token(ADDRESS, ADMIN_TOKEN, &credential.accessor_id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn long_role_name_is_truncated_to_default_limit() {
    let cluster = FakeCluster::new();
    let backend = backend(cluster.clone());
    write_config(&backend, ADDRESS).await;

    let role = "x".repeat(58);
    backend
        .handle_request(
            OperationKind::Update,
            &format!("role/{role}"),
            Some(json!({ "policies": "policy", "lease": "1h" })),
            &no_overrides(),
        )
        .await
        .unwrap();

    let issued = backend
        .handle(Operation::IssueCredential { role: role.clone() }, &no_overrides())
        .await
        .unwrap();
    let Response::Credential(issued) = issued else {
        panic!("expected a credential");
    };
    assert_eq!(issued.token_name.len(), 64);
    assert!(issued.token_name.starts_with("xxxx"));

    let upstream = cluster
        .lookup_self(ADDRESS, &issued.data.secret_id)
        .await
        .unwrap();
    assert_eq!(upstream.name, issued.token_name);
}

#[tokio::test]
async fn override_length_applies_when_config_sets_none() {
    let backend = backend(FakeCluster::new());
    write_config(&backend, ADDRESS).await;
    let role = "r".repeat(40);
    backend
        .handle_request(
            OperationKind::Update,
            &format!("role/{role}"),
            Some(json!({ "policies": ["policy"], "lease": "1h" })),
            &no_overrides(),
        )
        .await
        .unwrap();

    let overrides = Overrides::default().with_max_token_length(16);
    let response = backend
        .handle(Operation::IssueCredential { role }, &overrides)
        .await
        .unwrap();
    let Response::Credential(issued) = response else {
        panic!("expected a credential");
    };
    assert!(issued.token_name.len() <= 16);
    assert_eq!(issued.lease.internal.max_token_length, Some(16));
}

#[tokio::test]
async fn config_length_wins_over_override() {
    let backend = backend(FakeCluster::new());
    backend
        .handle_request(
            OperationKind::Update,
            "config/access",
            Some(json!({ "address": ADDRESS, "token": ADMIN_TOKEN, "max_token_length": 24 })),
            &no_overrides(),
        )
        .await
        .unwrap();
    let role = "r".repeat(40);
    backend
        .store()
        .write_role(&role, role_request(&["policy"], "1h"))
        .await
        .unwrap();

    let overrides = Overrides::default().with_max_token_length(16);
    let response = backend
        .handle(Operation::IssueCredential { role }, &overrides)
        .await
        .unwrap();
    let Response::Credential(issued) = response else {
        panic!("expected a credential");
    };
    assert!(issued.token_name.len() <= 24);
    assert!(issued.token_name.len() > 16);
}

// ── Roles and lease config through paths ──

#[tokio::test]
async fn role_read_list_delete_paths() {
    let backend = configured_backend(FakeCluster::new()).await;
    backend
        .handle_request(
            OperationKind::Update,
            "role/ops",
            Some(json!({ "type": "management", "lease": "30m", "global": true })),
            &no_overrides(),
        )
        .await
        .unwrap();

    let list = backend
        .handle_request(OperationKind::List, "role/", None, &no_overrides())
        .await
        .unwrap();
    assert_eq!(list.data().unwrap(), Some(json!({ "keys": ["ops", "test"] })));

    let role = backend
        .handle_request(OperationKind::Read, "role/ops", None, &no_overrides())
        .await
        .unwrap()
        .data()
        .unwrap()
        .unwrap();
    assert_eq!(role["type"], "management");
    assert_eq!(role["lease"], "30m");
    assert_eq!(role["global"], true);

    backend
        .handle_request(OperationKind::Delete, "role/ops", None, &no_overrides())
        .await
        .unwrap();
    let err = backend
        .handle_request(OperationKind::Read, "role/ops", None, &no_overrides())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::NotFound(_)));
}

#[tokio::test]
async fn lease_config_paths() {
    let backend = backend(FakeCluster::new());
    backend
        .handle_request(
            OperationKind::Update,
            "config/lease",
            Some(json!({ "ttl": "1h", "max_ttl": "12h" })),
            &no_overrides(),
        )
        .await
        .unwrap();

    let read = backend
        .handle_request(OperationKind::Read, "config/lease", None, &no_overrides())
        .await
        .unwrap();
    assert_eq!(read.data().unwrap(), Some(json!({ "ttl": "1h", "max_ttl": "12h" })));

    backend
        .handle_request(OperationKind::Delete, "config/lease", None, &no_overrides())
        .await
        .unwrap();
    let read = backend
        .handle_request(OperationKind::Read, "config/lease", None, &no_overrides())
        .await
        .unwrap();
    assert_eq!(read.data().unwrap(), Some(json!({ "ttl": null, "max_ttl": null })));
}

// ── Decoding ──

#[test]
fn unknown_paths_are_unsupported() {
    for (kind, path) in [
        (OperationKind::Read, "sys/health"),
        (OperationKind::Delete, "config/access"),
        (OperationKind::Update, "creds/test"),
        (OperationKind::List, "creds"),
    ] {
        let err = Operation::decode(kind, path, None).unwrap_err();
        assert!(matches!(err, BrokerError::Unsupported(_)), "{kind} {path}");
    }
}

#[test]
fn invalid_role_segment_is_validation_error() {
    let err = Operation::decode(OperationKind::Read, "creds/-bad", None).unwrap_err();
    assert!(matches!(err, BrokerError::Validation(_)));
}

#[test]
fn malformed_body_is_validation_error() {
    let err = Operation::decode(
        OperationKind::Update,
        "role/test",
        Some(json!({ "lease": 5 })),
    )
    .unwrap_err();
    assert!(matches!(err, BrokerError::Validation(_)));
}

#[test]
fn renew_and_revoke_require_a_lease_body() {
    for kind in [OperationKind::Renew, OperationKind::Revoke] {
        let err = Operation::decode(kind, "creds/test", None).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidLease(_)));

        let err = Operation::decode(kind, "creds/test", Some(json!({ "lease": "nope" })))
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidLease(_)));
    }
}

#[test]
fn lease_with_missing_internal_fields_still_decodes() {
    let op = Operation::decode(
        OperationKind::Revoke,
        "",
        Some(json!({
            "lease": {
                "ttl": "1h",
                "issued_at": "2026-01-01T00:00:00Z",
                "internal": {}
            }
        })),
    )
    .unwrap();
    let Operation::RevokeLease { lease } = op else {
        panic!("expected a revoke");
    };
    assert_eq!(lease.internal.accessor_id, None);
}

#[tokio::test]
async fn revoke_with_empty_envelope_is_invalid_lease() {
    let cluster = FakeCluster::new();
    let backend = configured_backend(cluster.clone()).await;
    let err = backend
        .handle_request(
            OperationKind::Revoke,
            "creds/test",
            Some(json!({
                "lease": { "ttl": "1h", "issued_at": "2026-01-01T00:00:00Z", "internal": {} }
            })),
            &no_overrides(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::InvalidLease(_)));
}

#[test]
fn write_config_debug_hides_token() {
    let op = Operation::decode(
        OperationKind::Update,
        "config/access",
        Some(json!({ "address": ADDRESS, "token": "super-secret" })),
    )
    .unwrap();
    assert!(!format!("{op:?}").contains("super-secret"));
}

// ── Over HTTP ──

#[tokio::test]
async fn issue_and_revoke_against_http_cluster() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/acl/token"))
        .and(header("X-Nomad-Token", ADMIN_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccessorID": "acc-http",
            "SecretID": "sec-http",
            "Name": "test-1",
            "Type": "client",
            "Policies": ["policy"],
            "Global": false,
            "CreateTime": "2026-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/acl/token/acc-http"))
        .and(header("X-Nomad-Token", ADMIN_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/acl/token/acc-http"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("Cannot delete nonexistent tokens: acc-http"),
        )
        .mount(&server)
        .await;

    let backend = Backend::with_nomad(
        BackendConfig::default(),
        Arc::new(InMemoryStorage::new()),
    )
    .unwrap();
    write_config(&backend, &server.uri()).await;
    write_test_role(&backend).await;

    let issued = backend
        .handle_request(OperationKind::Read, "creds/test", None, &no_overrides())
        .await
        .unwrap();
    assert_eq!(
        issued.data().unwrap(),
        Some(json!({ "secret_id": "sec-http", "accessor_id": "acc-http" }))
    );
    let lease = issued.lease().unwrap().clone();

    let first = backend
        .handle(Operation::RevokeLease { lease: lease.clone() }, &no_overrides())
        .await
        .unwrap();
    let second = backend
        .handle(Operation::RevokeLease { lease }, &no_overrides())
        .await
        .unwrap();
    assert_eq!(first, Response::Revoked(RevokeOutcome::Revoked));
    assert_eq!(second, Response::Revoked(RevokeOutcome::AlreadyAbsent));
}

#[tokio::test]
async fn http_failure_does_not_leak_admin_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/acl/token"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(format!("Permission denied for {ADMIN_TOKEN}")),
        )
        .mount(&server)
        .await;

    let backend = Backend::with_nomad(
        BackendConfig::default(),
        Arc::new(InMemoryStorage::new()),
    )
    .unwrap();
    write_config(&backend, &server.uri()).await;
    write_test_role(&backend).await;

    let err = backend
        .handle_request(OperationKind::Read, "creds/test", None, &no_overrides())
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Upstream { .. }));
    assert!(!err.to_string().contains(ADMIN_TOKEN));
}

#[tokio::test]
async fn http_revoke_with_rejected_admin_token_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/acl/token/acc-http"))
        .respond_with(ResponseTemplate::new(403).set_body_string("ACL token not found"))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Backend::with_nomad(
        BackendConfig::default(),
        Arc::new(InMemoryStorage::new()),
    )
    .unwrap();
    write_config(&backend, &server.uri()).await;

    let err = backend
        .handle_request(
            OperationKind::Revoke,
            "creds/test",
            Some(json!({
                "lease": {
                    "ttl": "6h",
                    "issued_at": "2026-01-01T00:00:00Z",
                    "internal": { "accessor_id": "acc-http", "role_name": "test" }
                }
            })),
            &no_overrides(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Upstream { .. }), "got {err:?}");
}
