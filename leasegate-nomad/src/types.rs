//! Wire types for the Nomad ACL API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nomad ACL token type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Client,
    Management,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Client => write!(f, "client"),
            TokenType::Management => write!(f, "management"),
        }
    }
}

impl std::str::FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(TokenType::Client),
            "management" => Ok(TokenType::Management),
            other => Err(format!("unknown token type: {other}")),
        }
    }
}

/// An ACL token as returned by Nomad.
///
/// `Debug` never prints the secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct AclToken {
    #[serde(rename = "AccessorID")]
    pub accessor_id: String,
    #[serde(rename = "SecretID", default)]
    pub secret_id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type")]
    pub token_type: TokenType,
    #[serde(rename = "Policies", default)]
    pub policies: Option<Vec<String>>,
    #[serde(rename = "Global", default)]
    pub global: bool,
    #[serde(rename = "CreateTime", default)]
    pub create_time: Option<DateTime<Utc>>,
}

impl fmt::Debug for AclToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AclToken")
            .field("accessor_id", &self.accessor_id)
            .field("secret_id", &"[redacted]")
            .field("name", &self.name)
            .field("token_type", &self.token_type)
            .field("policies", &self.policies)
            .field("global", &self.global)
            .field("create_time", &self.create_time)
            .finish()
    }
}

/// Body of `POST /v1/acl/token`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub token_type: TokenType,
    #[serde(rename = "Policies")]
    pub policies: Vec<String>,
    #[serde(rename = "Global")]
    pub global: bool,
}

/// An ACL policy, as written by `POST /v1/acl/policy/:name`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AclPolicy {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Rules")]
    pub rules: String,
}

/// Result of deleting a token by accessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The accessor was unknown upstream (expired or removed out-of-band).
    NotFound,
}
