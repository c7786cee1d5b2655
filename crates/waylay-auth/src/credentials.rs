//! Credentials for the Waylay platform.
//!
//! Credentials are plain values: the token provider never mutates them, it
//! replaces them when a callback resolves new ones.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::{AuthError, Result};
use crate::token::WaylayToken;

/// Placeholder shown instead of secrets.
pub const OBFUSCATED: &str = "********";

const API_KEY_BYTES: usize = 12;
const API_SECRET_BYTES: usize = 24;

// ─────────────────────────────────────────────────────────────────────────────
// Credentials type
// ─────────────────────────────────────────────────────────────────────────────

/// Supported authentication methods, with their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialsType {
    /// API key and secret of a client.
    Client,
    /// API key and secret of an application, scoped to a tenant.
    Application,
    /// Pre-issued bearer token.
    Token,
    /// No credentials yet; resolved through a callback when needed.
    Callback,
}

impl CredentialsType {
    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialsType::Client => "client_credentials",
            CredentialsType::Application => "application_credentials",
            CredentialsType::Token => "token",
            CredentialsType::Callback => "interactive",
        }
    }
}

impl fmt::Display for CredentialsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialsType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client_credentials" => Ok(CredentialsType::Client),
            "application_credentials" => Ok(CredentialsType::Application),
            "token" => Ok(CredentialsType::Token),
            "interactive" => Ok(CredentialsType::Callback),
            other => Err(AuthError::InvalidCredentials(format!(
                "cannot parse json for credential type {}",
                other
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials to the Waylay platform.
///
/// Every variant may carry a `gateway_url` and a (legacy) `accounts_url`
/// that tell the token provider where to exchange key/secret pairs.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// No credentials; a callback must resolve them on first use.
    None {
        gateway_url: Option<String>,
        accounts_url: Option<String>,
    },
    /// Client credentials: a 12 byte hex key and a 24 byte base64 secret.
    KeySecret {
        key: String,
        secret: String,
        gateway_url: Option<String>,
        accounts_url: Option<String>,
    },
    /// Application credentials, bound to a tenant.
    KeySecretTenant {
        key: String,
        secret: String,
        tenant: String,
        gateway_url: Option<String>,
        accounts_url: Option<String>,
    },
    /// A pre-issued bearer token.
    Token {
        token: String,
        gateway_url: Option<String>,
        accounts_url: Option<String>,
    },
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::none()
    }
}

impl Credentials {
    /// Credentials to be resolved later.
    pub fn none() -> Self {
        Credentials::None {
            gateway_url: None,
            accounts_url: None,
        }
    }

    /// Client credentials from an API key and secret.
    pub fn client(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials::KeySecret {
            key: key.into(),
            secret: secret.into(),
            gateway_url: None,
            accounts_url: None,
        }
    }

    /// Application credentials from an API key, secret and tenant id.
    pub fn application(
        key: impl Into<String>,
        secret: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Credentials::KeySecretTenant {
            key: key.into(),
            secret: secret.into(),
            tenant: tenant.into(),
            gateway_url: None,
            accounts_url: None,
        }
    }

    /// Credentials wrapping a pre-issued token.
    pub fn token(token: impl Into<String>) -> Self {
        Credentials::Token {
            token: token.into(),
            gateway_url: None,
            accounts_url: None,
        }
    }

    /// Set the gateway url.
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        *self.gateway_url_mut() = Some(url.into());
        self
    }

    /// Set the accounts url.
    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        *self.accounts_url_mut() = Some(url.into());
        self
    }

    /// The authentication method of these credentials.
    pub fn credentials_type(&self) -> CredentialsType {
        match self {
            Credentials::None { .. } => CredentialsType::Callback,
            Credentials::KeySecret { .. } => CredentialsType::Client,
            Credentials::KeySecretTenant { .. } => CredentialsType::Application,
            Credentials::Token { .. } => CredentialsType::Token,
        }
    }

    pub fn gateway_url(&self) -> Option<&str> {
        match self {
            Credentials::None { gateway_url, .. }
            | Credentials::KeySecret { gateway_url, .. }
            | Credentials::KeySecretTenant { gateway_url, .. }
            | Credentials::Token { gateway_url, .. } => gateway_url.as_deref(),
        }
    }

    pub fn accounts_url(&self) -> Option<&str> {
        match self {
            Credentials::None { accounts_url, .. }
            | Credentials::KeySecret { accounts_url, .. }
            | Credentials::KeySecretTenant { accounts_url, .. }
            | Credentials::Token { accounts_url, .. } => accounts_url.as_deref(),
        }
    }

    fn gateway_url_mut(&mut self) -> &mut Option<String> {
        match self {
            Credentials::None { gateway_url, .. }
            | Credentials::KeySecret { gateway_url, .. }
            | Credentials::KeySecretTenant { gateway_url, .. }
            | Credentials::Token { gateway_url, .. } => gateway_url,
        }
    }

    fn accounts_url_mut(&mut self) -> &mut Option<String> {
        match self {
            Credentials::None { accounts_url, .. }
            | Credentials::KeySecret { accounts_url, .. }
            | Credentials::KeySecretTenant { accounts_url, .. }
            | Credentials::Token { accounts_url, .. } => accounts_url,
        }
    }

    /// The main identifier of these credentials.
    ///
    /// The API key for key/secret credentials, `[domain] subject` for tokens.
    pub fn id(&self) -> Option<String> {
        match self {
            Credentials::None { .. } => None,
            Credentials::KeySecret { key, .. } | Credentials::KeySecretTenant { key, .. } => {
                Some(key.clone())
            }
            Credentials::Token { token, .. } => Some(match WaylayToken::parse(token.as_str()) {
                Ok(token) => format!(
                    "[{}] {}",
                    token.domain().unwrap_or("None"),
                    token.subject().unwrap_or("None")
                ),
                Err(e) => format!("INVALID_TOKEN({})", e),
            }),
        }
    }

    /// Whether these credentials are well-formed.
    ///
    /// This is a pure check on the values: it does not assure that they lead
    /// to a successful authentication.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Credentials::None { .. } => true,
            Credentials::KeySecret { key, secret, .. }
            | Credentials::KeySecretTenant { key, secret, .. } => {
                is_api_key(key) && is_api_secret(secret)
            }
            Credentials::Token { token, .. } => WaylayToken::parse(token.as_str())
                .map(|token| token.tenant().is_some())
                .unwrap_or(false),
        }
    }

    /// A json representation, with secrets replaced when `obfuscate` is set.
    pub fn to_dict(&self, obfuscate: bool) -> Value {
        let hide = |secret: &str| {
            if obfuscate {
                OBFUSCATED.to_string()
            } else {
                secret.to_string()
            }
        };
        let mut doc = Map::new();
        doc.insert("type".into(), json!(self.credentials_type().as_str()));
        match self {
            Credentials::None { .. } => {}
            Credentials::KeySecret { key, secret, .. } => {
                doc.insert("api_key".into(), json!(key));
                doc.insert("api_secret".into(), json!(hide(secret)));
            }
            Credentials::KeySecretTenant {
                key,
                secret,
                tenant,
                ..
            } => {
                doc.insert("api_key".into(), json!(key));
                doc.insert("api_secret".into(), json!(hide(secret)));
                doc.insert("tenant_id".into(), json!(tenant));
            }
            Credentials::Token { token, .. } => {
                doc.insert("token".into(), json!(hide(token)));
            }
        }
        doc.insert("gateway_url".into(), json!(self.gateway_url()));
        doc.insert("accounts_url".into(), json!(self.accounts_url()));
        Value::Object(doc)
    }

    /// Parse the json representation produced by [`Credentials::to_dict`].
    pub fn from_dict(value: &Value) -> Result<Self> {
        let doc = CredentialsDocument::deserialize(value)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
        let kind: CredentialsType = doc
            .kind
            .as_deref()
            .ok_or_else(|| AuthError::InvalidCredentials("missing type".to_string()))?
            .parse()?;
        let required = |field: Option<String>, name: &str| {
            field.ok_or_else(|| AuthError::InvalidCredentials(format!("missing {}", name)))
        };
        let credentials = match kind {
            CredentialsType::Callback => Credentials::None {
                gateway_url: doc.gateway_url,
                accounts_url: doc.accounts_url,
            },
            CredentialsType::Client => Credentials::KeySecret {
                key: required(doc.api_key, "api_key")?,
                secret: required(doc.api_secret, "api_secret")?,
                gateway_url: doc.gateway_url,
                accounts_url: doc.accounts_url,
            },
            CredentialsType::Application => Credentials::KeySecretTenant {
                key: required(doc.api_key, "api_key")?,
                secret: required(doc.api_secret, "api_secret")?,
                tenant: required(doc.tenant_id, "tenant_id")?,
                gateway_url: doc.gateway_url,
                accounts_url: doc.accounts_url,
            },
            CredentialsType::Token => Credentials::Token {
                token: required(doc.token, "token")?,
                gateway_url: doc.gateway_url,
                accounts_url: doc.accounts_url,
            },
        };
        Ok(credentials)
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dict(true))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Credentials({})>", self)
    }
}

#[derive(Deserialize)]
struct CredentialsDocument {
    #[serde(rename = "type")]
    kind: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    tenant_id: Option<String>,
    token: Option<String>,
    gateway_url: Option<String>,
    accounts_url: Option<String>,
}

fn is_api_key(key: &str) -> bool {
    matches!(hex::decode(key), Ok(bytes) if bytes.len() == API_KEY_BYTES)
}

fn is_api_secret(secret: &str) -> bool {
    matches!(STANDARD.decode(secret), Ok(bytes) if bytes.len() == API_SECRET_BYTES)
}
