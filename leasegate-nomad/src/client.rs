//! HTTP client for the Nomad ACL API.
//!
//! Authenticates with the `X-Nomad-Token` header. Non-2xx responses become
//! [`NomadError::Status`], except a 404 or Nomad's "nonexistent token" 500,
//! which are reported as [`NomadError::NotFound`]. Authorization failures
//! are never folded into `NotFound`, whatever their body says.

use crate::error::{NomadError, NomadResult};
use crate::types::{AclPolicy, AclToken, CreateTokenRequest, DeleteOutcome};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Capability surface of the remote cluster used by the broker.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Bootstraps the ACL system, returning the initial management token.
    async fn bootstrap(&self, address: &str) -> NomadResult<AclToken>;

    /// Mints a new token using the administrative credential.
    async fn create_token(
        &self,
        address: &str,
        admin_token: &str,
        request: &CreateTokenRequest,
    ) -> NomadResult<AclToken>;

    /// Looks up the token identified by its own secret.
    async fn lookup_self(&self, address: &str, secret_id: &str) -> NomadResult<AclToken>;

    /// Reads a token by accessor. Absent tokens yield [`NomadError::NotFound`].
    async fn read_token(
        &self,
        address: &str,
        admin_token: &str,
        accessor_id: &str,
    ) -> NomadResult<AclToken>;

    /// Deletes a token by accessor.
    async fn delete_token(
        &self,
        address: &str,
        admin_token: &str,
        accessor_id: &str,
    ) -> NomadResult<DeleteOutcome>;

    /// Creates or updates an ACL policy.
    async fn upsert_policy(
        &self,
        address: &str,
        admin_token: &str,
        policy: &AclPolicy,
    ) -> NomadResult<()>;
}

/// Validates a cluster address and returns it parsed.
pub fn parse_address(address: &str) -> NomadResult<Url> {
    let url = Url::parse(address).map_err(|e| NomadError::InvalidAddress(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NomadError::InvalidAddress(format!(
            "unsupported scheme: {other}"
        ))),
    }
}

/// reqwest-backed [`ClusterClient`].
#[derive(Clone)]
pub struct NomadClient {
    client: Client,
}

impl NomadClient {
    pub fn new(timeout: Duration) -> NomadResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn url(address: &str, path: &str) -> String {
        format!("{}{}", address.trim_end_matches('/'), path)
    }

    fn token_path(accessor_id: &str) -> String {
        format!("/v1/acl/token/{}", urlencoding::encode(accessor_id))
    }
}

/// Maps a non-success response to an error, reading the body as the message.
async fn check(resp: Response) -> NomadResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default().trim().to_string();
    if is_absent_target(status, &message) {
        return Err(NomadError::NotFound(message));
    }
    Err(NomadError::Status {
        status: status.as_u16(),
        message,
    })
}

/// True when the response reports the addressed object as absent.
///
/// Nomad reports deletes of unknown accessors as a 500 mentioning a
/// nonexistent token. A 401/403 "ACL token not found" refers to the
/// credential that made the request and stays a status error.
fn is_absent_target(status: StatusCode, message: &str) -> bool {
    match status {
        StatusCode::NOT_FOUND => true,
        StatusCode::INTERNAL_SERVER_ERROR => {
            message.to_ascii_lowercase().contains("nonexistent token")
        }
        _ => false,
    }
}

#[async_trait]
impl ClusterClient for NomadClient {
    async fn bootstrap(&self, address: &str) -> NomadResult<AclToken> {
        let resp = self
            .client
            .post(Self::url(address, "/v1/acl/bootstrap"))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn create_token(
        &self,
        address: &str,
        admin_token: &str,
        request: &CreateTokenRequest,
    ) -> NomadResult<AclToken> {
        debug!("creating {} token {}", request.token_type, request.name);
        let resp = self
            .client
            .post(Self::url(address, "/v1/acl/token"))
            .header(TOKEN_HEADER, admin_token)
            .json(request)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn lookup_self(&self, address: &str, secret_id: &str) -> NomadResult<AclToken> {
        let resp = self
            .client
            .get(Self::url(address, "/v1/acl/token/self"))
            .header(TOKEN_HEADER, secret_id)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn read_token(
        &self,
        address: &str,
        admin_token: &str,
        accessor_id: &str,
    ) -> NomadResult<AclToken> {
        let resp = self
            .client
            .get(Self::url(address, &Self::token_path(accessor_id)))
            .header(TOKEN_HEADER, admin_token)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn delete_token(
        &self,
        address: &str,
        admin_token: &str,
        accessor_id: &str,
    ) -> NomadResult<DeleteOutcome> {
        let resp = self
            .client
            .delete(Self::url(address, &Self::token_path(accessor_id)))
            .header(TOKEN_HEADER, admin_token)
            .send()
            .await?;

        match check(resp).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(NomadError::NotFound(message)) => {
                debug!("token {accessor_id} already absent upstream: {message}");
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    async fn upsert_policy(
        &self,
        address: &str,
        admin_token: &str,
        policy: &AclPolicy,
    ) -> NomadResult<()> {
        let path = format!("/v1/acl/policy/{}", urlencoding::encode(&policy.name));
        let resp = self
            .client
            .post(Self::url(address, &path))
            .header(TOKEN_HEADER, admin_token)
            .json(policy)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}
