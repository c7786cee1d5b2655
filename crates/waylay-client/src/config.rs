//! Client configuration.
//!
//! A [`WaylayConfig`] ties together a named profile, the credentials (held
//! by the token provider), local endpoint overrides and the http options
//! of the client. Its json form is the profile document:
//!
//! ```json
//! {
//!   "credentials": {"type": "client_credentials", "api_key": "...", "api_secret": "********",
//!                   "gateway_url": "https://api.waylay.io", "accounts_url": null},
//!   "profile": "_default_",
//!   "settings": {"waylay_queries": "https://queries.example.com"}
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use waylay_auth::{Credentials, WaylayToken, WaylayTokenAuth};

use crate::client::{DEFAULT_STREAM_TIMEOUT, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};

/// Name of the default profile.
pub const DEFAULT_PROFILE: &str = "_default_";

/// Settings key of the gateway url.
pub const SERVICE_KEY_GATEWAY: &str = "waylay_gateway";

/// Settings key of the (legacy) accounts url.
pub const SERVICE_KEY_ACCOUNTS: &str = "waylay_accounts";

const SETTINGS_PREFIX: &str = "waylay_";

/// Local settings: `waylay_<service>` keys mapped to root urls.
pub type Settings = BTreeMap<String, String>;

// ─────────────────────────────────────────────────────────────────────────────
// Http options
// ─────────────────────────────────────────────────────────────────────────────

/// Transport options of clients built from a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    /// Timeout of ordinary calls.
    pub timeout: Duration,
    /// Timeout of streaming calls.
    pub stream_timeout: Duration,
    /// User agent header.
    pub user_agent: String,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            user_agent: format!("waylay-sdk/rust/{}", env!("CARGO_PKG_VERSION")),
            default_headers: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth urls
// ─────────────────────────────────────────────────────────────────────────────

/// Explicit gateway and accounts urls for new credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthUrls {
    pub gateway_url: Option<String>,
    pub accounts_url: Option<String>,
}

impl AuthUrls {
    pub fn gateway(url: impl Into<String>) -> Self {
        Self {
            gateway_url: Some(url.into()),
            accounts_url: None,
        }
    }

    pub fn with_accounts(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = Some(url.into());
        self
    }

    /// Fill missing urls from the `waylay_gateway` and `waylay_accounts` settings.
    fn or_settings(self, settings: &Settings) -> Self {
        Self {
            gateway_url: self
                .gateway_url
                .or_else(|| settings.get(SERVICE_KEY_GATEWAY).cloned()),
            accounts_url: self
                .accounts_url
                .or_else(|| settings.get(SERVICE_KEY_ACCOUNTS).cloned()),
        }
    }

    fn apply(self, mut credentials: Credentials) -> Credentials {
        if let Some(url) = self.gateway_url {
            credentials = credentials.with_gateway_url(url);
        }
        if let Some(url) = self.accounts_url {
            credentials = credentials.with_accounts_url(url);
        }
        credentials
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WaylayConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication and endpoint configuration for the Waylay platform.
#[derive(Clone)]
pub struct WaylayConfig {
    profile: String,
    auth: Arc<WaylayTokenAuth>,
    local_settings: Settings,
    http: HttpOptions,
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    credentials: Option<Value>,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    settings: Settings,
}

impl WaylayConfig {
    /// A configuration for `credentials`, under the default profile.
    pub fn new(credentials: Credentials) -> Self {
        Self::from_provider(WaylayTokenAuth::new(credentials))
    }

    /// A configuration around a preconfigured token provider, e.g. one
    /// with a credentials callback.
    pub fn from_provider(auth: WaylayTokenAuth) -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            auth: Arc::new(auth),
            local_settings: Settings::new(),
            http: HttpOptions::default(),
        }
    }

    pub fn from_credentials(credentials: Credentials, settings: Settings) -> Self {
        Self::new(credentials).with_settings(settings)
    }

    pub fn from_client_credentials(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        urls: AuthUrls,
        settings: Settings,
    ) -> Self {
        let credentials = urls
            .or_settings(&settings)
            .apply(Credentials::client(api_key, api_secret));
        Self::from_credentials(credentials, settings)
    }

    pub fn from_application_credentials(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        tenant: impl Into<String>,
        urls: AuthUrls,
        settings: Settings,
    ) -> Self {
        let credentials = urls
            .or_settings(&settings)
            .apply(Credentials::application(api_key, api_secret, tenant));
        Self::from_credentials(credentials, settings)
    }

    pub fn from_token(token: impl Into<String>, urls: AuthUrls, settings: Settings) -> Self {
        let credentials = urls.or_settings(&settings).apply(Credentials::token(token));
        Self::from_credentials(credentials, settings)
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.local_settings.extend(settings);
        self
    }

    pub fn with_http_options(mut self, http: HttpOptions) -> Self {
        self.http = http;
        self
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Current credentials, as configured or as returned by the last callback.
    pub fn credentials(&self) -> Credentials {
        self.auth.credentials()
    }

    /// The token provider used for requests.
    pub fn auth(&self) -> Arc<WaylayTokenAuth> {
        Arc::clone(&self.auth)
    }

    pub fn http_options(&self) -> &HttpOptions {
        &self.http
    }

    pub fn gateway_url(&self) -> Option<String> {
        self.credentials().gateway_url().map(root_url_for)
    }

    pub fn accounts_url(&self) -> Option<String> {
        self.credentials().accounts_url().map(root_url_for)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Endpoint settings
    // ─────────────────────────────────────────────────────────────────────────

    pub fn local_settings(&self) -> &Settings {
        &self.local_settings
    }

    /// Set or, with `None`, remove local settings.
    pub fn set_local_settings<K, V>(&mut self, settings: impl IntoIterator<Item = (K, Option<V>)>) -> &Settings
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in settings {
            let key = key.into();
            match value {
                Some(value) => {
                    self.local_settings.insert(key, value.into());
                }
                None => {
                    self.local_settings.remove(&key);
                }
            }
        }
        &self.local_settings
    }

    /// Root url of a service.
    ///
    /// A local `waylay_<service>` override wins; otherwise the service lives
    /// at `gateway_root_path` on the gateway.
    pub fn root_url(&self, service: &str, gateway_root_path: Option<&str>) -> Option<String> {
        if let Some(url) = self.local_settings.get(&root_url_key(service)) {
            return Some(root_url_for(url));
        }
        let gateway = self.gateway_url()?;
        gateway_root_path.map(|path| root_url_for(&format!("{}{}", gateway, path)))
    }

    /// Override the root url of a service; `None` removes the override.
    pub fn set_root_url(&mut self, service: &str, root_url: Option<&str>) {
        self.set_local_settings([(root_url_key(service), root_url)]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────────────────

    /// The current valid token, obtaining one if needed.
    pub async fn get_valid_token(&self) -> Result<WaylayToken> {
        self.auth
            .assure_valid_token_async()
            .await
            .map_err(|e| Error::Config(format!("Cannot get valid token: {}", e)))
    }

    /// Blocking variant of [`WaylayConfig::get_valid_token`].
    #[cfg(feature = "blocking")]
    pub fn get_valid_token_blocking(&self) -> Result<WaylayToken> {
        self.auth
            .assure_valid_token()
            .map_err(|e| Error::Config(format!("Cannot get valid token: {}", e)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization
    // ─────────────────────────────────────────────────────────────────────────

    /// The profile document, with secrets replaced when `obfuscate` is set.
    pub fn to_json(&self, obfuscate: bool) -> Value {
        json!({
            "credentials": self.credentials().to_dict(obfuscate),
            "profile": self.profile,
            "settings": self.local_settings,
        })
    }

    /// Parse a profile document. Missing credentials are resolved later.
    pub fn from_json(value: &Value) -> Result<Self> {
        let doc = ProfileDocument::deserialize(value)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;
        let credentials = match &doc.credentials {
            Some(credentials) => Credentials::from_dict(credentials)?,
            None => Credentials::none(),
        };
        Ok(Self::from_credentials(credentials, doc.settings)
            .with_profile(doc.profile.unwrap_or_else(|| DEFAULT_PROFILE.to_string())))
    }
}

impl fmt::Display for WaylayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json(true))
    }
}

impl fmt::Debug for WaylayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<WaylayConfig({})>", self)
    }
}

fn root_url_key(service: &str) -> String {
    if service.starts_with(SETTINGS_PREFIX) {
        service.to_string()
    } else {
        format!("{}{}", SETTINGS_PREFIX, service)
    }
}

/// Normalize a host name or url: bare hosts become `https://` urls and
/// trailing slashes are dropped.
pub fn root_url_for(host_or_url: &str) -> String {
    let url = host_or_url.trim();
    let url = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    url.trim_end_matches('/').to_string()
}
