//! Records, requests and lease envelopes.
//!
//! Request types decode leniently (missing fields default to empty) so that
//! validation, not deserialization, decides what is acceptable and reports it
//! as a validation failure.

use chrono::{DateTime, Utc};
use leasegate_nomad::TokenType;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

// ── Access configuration ──

/// Stored `config/access` record. Holds the administrative token.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub address: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_token_length: Option<usize>,
}

impl fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessConfig")
            .field("address", &self.address)
            .field("token", &"[redacted]")
            .field("max_token_length", &self.max_token_length)
            .finish()
    }
}

/// Body of a `config/access` write.
#[derive(Clone, Default, Deserialize)]
pub struct WriteConfigRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub max_token_length: Option<i64>,
}

impl fmt::Debug for WriteConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteConfigRequest")
            .field("address", &self.address)
            .field("token", &"[redacted]")
            .field("max_token_length", &self.max_token_length)
            .finish()
    }
}

/// Result of a `config/access` read. Never carries the token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfigView {
    pub address: String,
    pub max_token_length: usize,
}

// ── Lease configuration ──

/// Backend-wide lease defaults stored at `config/lease`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Renewal increment used when the caller requests none.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
    /// Renewal cap for roles that declare no `max_ttl`.
    #[serde(default, with = "humantime_serde")]
    pub max_ttl: Option<Duration>,
}

/// Body of a `config/lease` write.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WriteLeaseConfigRequest {
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub max_ttl: Option<String>,
}

// ── Roles ──

/// Stored role definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub policies: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub lease: Duration,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_ttl: Option<Duration>,
    #[serde(rename = "type", default)]
    pub token_type: TokenType,
    #[serde(default)]
    pub global: bool,
}

/// Body of a `role/<name>` write.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WriteRoleRequest {
    #[serde(default, deserialize_with = "deserialize_string_list")]
    pub policies: Vec<String>,
    #[serde(default)]
    pub lease: String,
    #[serde(default)]
    pub max_ttl: Option<String>,
    #[serde(rename = "type", default)]
    pub token_type: TokenType,
    #[serde(default)]
    pub global: bool,
}

/// Accepts either a JSON array of strings or a comma-separated string.
fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let items = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect(),
        StringOrList::Many(v) => v,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

// ── Lease envelope ──

/// Internal lease data. Hidden from the caller, handed back on renew/revoke.
///
/// Every field is optional on the wire so a corrupted envelope decodes and
/// is rejected as an invalid lease instead of a decoding failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInternal {
    #[serde(default)]
    pub accessor_id: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub max_token_length: Option<usize>,
}

/// Lease bookkeeping for one issued credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    pub issued_at: DateTime<Utc>,
    pub internal: LeaseInternal,
}

/// User-visible credential data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData {
    pub secret_id: String,
    pub accessor_id: String,
}

impl fmt::Debug for CredentialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialData")
            .field("secret_id", &"[redacted]")
            .field("accessor_id", &self.accessor_id)
            .finish()
    }
}

/// Everything returned by an issuance: the credential plus its lease.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub data: CredentialData,
    pub lease: Lease,
    /// Display name registered upstream for the token.
    pub token_name: String,
}
