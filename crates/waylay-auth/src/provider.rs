//! Bearer-token authentication with transparent refresh.
//!
//! [`WaylayTokenAuth`] resolves [`Credentials`] into a [`WaylayToken`],
//! caches it and replaces it once it is no longer valid. The async and
//! blocking entry points share the same resolution and validation steps and
//! only differ in how the token exchange call is sent.
//!
//! Refresh is reactive: the cached token is checked on every call. There is
//! no single-flight gate, so concurrent calls that observe an expired token
//! may each exchange credentials; the last token stored wins.

use std::fmt;
use std::sync::Arc;
#[cfg(feature = "blocking")]
use std::sync::OnceLock;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::credentials::{Credentials, CredentialsType};
use crate::error::{AuthError, Result};
use crate::token::WaylayToken;

/// Subpath of the gateway that hosts the accounts service.
pub const ACCOUNTS_SUBPATH: &str = "/accounts/v1";

// ============================================================================
// Credentials callback
// ============================================================================

/// Resolves credentials when none were configured.
///
/// The argument is the accounts (or gateway) url of the unresolved
/// credentials, as a hint for prompting.
pub trait CredentialsCallback: Send + Sync {
    fn resolve(&self, endpoint_hint: Option<&str>) -> Result<Credentials>;
}

impl<F> CredentialsCallback for F
where
    F: Fn(Option<&str>) -> Result<Credentials> + Send + Sync,
{
    fn resolve(&self, endpoint_hint: Option<&str>) -> Result<Credentials> {
        self(endpoint_hint)
    }
}

// ============================================================================
// RequestAuth trait
// ============================================================================

/// Attaches authentication to outgoing requests.
#[async_trait]
pub trait RequestAuth: Send + Sync + fmt::Debug {
    /// Add the authentication headers to `request`.
    async fn authenticate(&self, request: &mut reqwest::Request) -> Result<()>;
}

/// Shared request authenticator.
pub type SharedAuth = Arc<dyn RequestAuth>;

// ============================================================================
// WaylayTokenAuth
// ============================================================================

/// Token authentication provider for the Waylay platform.
pub struct WaylayTokenAuth {
    credentials: RwLock<Credentials>,
    current_token: RwLock<Option<WaylayToken>>,
    callback: Option<Arc<dyn CredentialsCallback>>,
    http_client: reqwest::Client,
    #[cfg(feature = "blocking")]
    blocking_client: OnceLock<reqwest::blocking::Client>,
}

/// A token exchange, independent of the transport that sends it.
#[derive(Debug, Clone, PartialEq)]
struct TokenRequest {
    url: String,
    query: Vec<(&'static str, String)>,
    body: Value,
}

/// How the next token is obtained.
enum TokenSource {
    Issued(String),
    Exchange(TokenRequest),
}

#[derive(Debug, Clone, Copy)]
enum TokenOrigin {
    Issued,
    Exchanged,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

impl WaylayTokenAuth {
    /// Create a provider for the given credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: RwLock::new(credentials),
            current_token: RwLock::new(None),
            callback: None,
            http_client: reqwest::Client::new(),
            #[cfg(feature = "blocking")]
            blocking_client: OnceLock::new(),
        }
    }

    /// Register a callback that resolves missing credentials.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<Credentials> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Use a specific HTTP client for async token exchanges.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    /// Use a specific HTTP client for blocking token exchanges.
    #[cfg(feature = "blocking")]
    pub fn with_blocking_http_client(self, client: reqwest::blocking::Client) -> Self {
        let _ = self.blocking_client.set(client);
        self
    }

    /// The current credentials, as resolved so far.
    pub fn credentials(&self) -> Credentials {
        self.credentials.read().clone()
    }

    /// The cached token, valid or not.
    pub fn current_token(&self) -> Option<WaylayToken> {
        self.current_token.read().clone()
    }

    /// Replace the credentials and drop the cached token.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write() = credentials;
        *self.current_token.write() = None;
    }

    /// Return the cached token if valid, otherwise obtain and cache a new one.
    pub async fn assure_valid_token_async(&self) -> Result<WaylayToken> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        match self.token_source()? {
            TokenSource::Issued(token) => self.store_token(token, TokenOrigin::Issued),
            TokenSource::Exchange(request) => {
                let token = self.exchange_async(&request).await?;
                self.store_token(token, TokenOrigin::Exchanged)
            }
        }
    }

    /// Blocking variant of [`WaylayTokenAuth::assure_valid_token_async`].
    ///
    /// Must not be called from within an async runtime.
    #[cfg(feature = "blocking")]
    pub fn assure_valid_token(&self) -> Result<WaylayToken> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        match self.token_source()? {
            TokenSource::Issued(token) => self.store_token(token, TokenOrigin::Issued),
            TokenSource::Exchange(request) => {
                let token = self.exchange_blocking(&request)?;
                self.store_token(token, TokenOrigin::Exchanged)
            }
        }
    }

    /// Set the bearer token on a blocking request.
    #[cfg(feature = "blocking")]
    pub fn authenticate_blocking(&self, request: &mut reqwest::blocking::Request) -> Result<()> {
        let token = self.assure_valid_token()?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, bearer_header(&token)?);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared resolution steps
    // ─────────────────────────────────────────────────────────────────────────

    fn cached_token(&self) -> Option<WaylayToken> {
        let cache = self.current_token.read();
        match cache.as_ref() {
            Some(token) if token.is_valid() => {
                tracing::debug!(tenant = ?token.tenant(), "Using cached waylay token");
                Some(token.clone())
            }
            Some(token) => {
                tracing::debug!(
                    expires_seconds = ?token.expires_seconds(),
                    "Cached waylay token is no longer valid"
                );
                None
            }
            None => None,
        }
    }

    /// Credentials usable for a token, invoking the callback if there are none.
    fn resolve_credentials(&self) -> Result<Credentials> {
        let current = self.credentials();
        let credentials = match current {
            Credentials::None { .. } => {
                let callback = self.callback.as_ref().ok_or(AuthError::NoCredentials)?;
                let hint = current.accounts_url().or(current.gateway_url());
                let resolved = callback.resolve(hint)?;
                *self.credentials.write() = resolved.clone();
                resolved
            }
            other => other,
        };
        match credentials.credentials_type() {
            CredentialsType::Callback => Err(AuthError::UnsupportedCredentials(
                CredentialsType::Callback.to_string(),
            )),
            _ => Ok(credentials),
        }
    }

    fn token_source(&self) -> Result<TokenSource> {
        match self.resolve_credentials()? {
            Credentials::Token { token, .. } => Ok(TokenSource::Issued(token)),
            credentials => Ok(TokenSource::Exchange(token_request(&credentials)?)),
        }
    }

    fn store_token(&self, token_string: String, origin: TokenOrigin) -> Result<WaylayToken> {
        let token = WaylayToken::parse(token_string)?.validate()?;
        match origin {
            TokenOrigin::Exchanged => tracing::info!(
                tenant = ?token.tenant(),
                subject = ?token.subject(),
                "Obtained new waylay token"
            ),
            TokenOrigin::Issued => tracing::debug!(
                tenant = ?token.tenant(),
                subject = ?token.subject(),
                "Using issued waylay token"
            ),
        }
        *self.current_token.write() = Some(token.clone());
        Ok(token)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transports
    // ─────────────────────────────────────────────────────────────────────────

    async fn exchange_async(&self, request: &TokenRequest) -> Result<String> {
        let response = self
            .http_client
            .post(&request.url)
            .query(&request.query)
            .json(&request.body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AuthError::Exchange)?;
        let body: TokenResponse = response.json().await.map_err(AuthError::Exchange)?;
        Ok(body.token)
    }

    #[cfg(feature = "blocking")]
    fn exchange_blocking(&self, request: &TokenRequest) -> Result<String> {
        let body: TokenResponse = self
            .blocking_client()?
            .post(&request.url)
            .query(&request.query)
            .json(&request.body)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(AuthError::Exchange)?;
        Ok(body.token)
    }

    #[cfg(feature = "blocking")]
    fn blocking_client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking_client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(AuthError::Exchange)?;
        Ok(self.blocking_client.get_or_init(|| client))
    }
}

#[async_trait]
impl RequestAuth for WaylayTokenAuth {
    async fn authenticate(&self, request: &mut reqwest::Request) -> Result<()> {
        let token = self.assure_valid_token_async().await?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, bearer_header(&token)?);
        Ok(())
    }
}

impl fmt::Debug for WaylayTokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaylayTokenAuth")
            .field("credentials", &*self.credentials.read())
            .field("current_token", &*self.current_token.read())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

fn bearer_header(token: &WaylayToken) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| AuthError::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}

/// A configured endpoint as an absolute url: a bare host means
/// `https://<host>`, trailing slashes are dropped.
fn endpoint_root(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Build the token exchange for key/secret credentials.
fn token_request(credentials: &Credentials) -> Result<TokenRequest> {
    let prefix = match (credentials.accounts_url(), credentials.gateway_url()) {
        (Some(accounts), _) => endpoint_root(accounts),
        (None, Some(gateway)) => format!("{}{}", endpoint_root(gateway), ACCOUNTS_SUBPATH),
        (None, None) => {
            return Err(AuthError::NoEndpoint(
                credentials.credentials_type().to_string(),
            ));
        }
    };
    let url = format!("{}/tokens", prefix);
    match credentials {
        Credentials::KeySecret { key, secret, .. } => Ok(TokenRequest {
            url,
            query: vec![("grant_type", CredentialsType::Client.to_string())],
            body: json!({ "clientId": key, "clientSecret": secret }),
        }),
        Credentials::KeySecretTenant {
            key,
            secret,
            tenant,
            ..
        } => Ok(TokenRequest {
            url,
            query: vec![
                ("grant_type", CredentialsType::Application.to_string()),
                ("tenant", tenant.clone()),
            ],
            body: json!({
                "applicationId": key,
                "applicationSecret": secret,
                "tenant": tenant,
            }),
        }),
        other => Err(AuthError::UnsupportedCredentials(
            other.credentials_type().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::unsigned_token;
    use chrono::Utc;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    const KEY: &str = "0123456789abcdef01234567";
    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3";

    fn valid_token() -> String {
        unsigned_token(&json!({
            "tenant": "tenant-1",
            "domain": "acme.waylay.io",
            "sub": "users/alice",
            "exp": Utc::now().timestamp() + 3600,
        }))
    }

    fn token_response(token: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "token": token }))
    }

    /// Records the info messages logged by this crate.
    struct InfoMessages(Arc<Mutex<Vec<String>>>);

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: Subscriber> Layer<S> for InfoMessages {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            if *meta.level() != Level::INFO || !meta.target().starts_with("waylay_auth") {
                return;
            }
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }

    #[test]
    fn test_token_request_for_client_credentials() {
        let creds = Credentials::client(KEY, SECRET).with_gateway_url("https://api.waylay.io/");
        let request = token_request(&creds).unwrap();
        assert_eq!(request.url, "https://api.waylay.io/accounts/v1/tokens");
        assert_eq!(
            request.query,
            vec![("grant_type", "client_credentials".to_string())]
        );
        assert_eq!(request.body, json!({"clientId": KEY, "clientSecret": SECRET}));
    }

    #[test]
    fn test_token_request_prefers_accounts_url() {
        let creds = Credentials::application(KEY, SECRET, "t1")
            .with_gateway_url("https://api.waylay.io")
            .with_accounts_url("https://accounts.waylay.io");
        let request = token_request(&creds).unwrap();
        assert_eq!(request.url, "https://accounts.waylay.io/tokens");
        assert_eq!(request.query[1], ("tenant", "t1".to_string()));
        assert_eq!(request.body["applicationId"], KEY);
        assert_eq!(request.body["applicationSecret"], SECRET);
    }

    #[test]
    fn test_token_request_for_bare_hosts() {
        let creds = Credentials::client(KEY, SECRET).with_gateway_url("api.waylay.io");
        let request = token_request(&creds).unwrap();
        assert_eq!(request.url, "https://api.waylay.io/accounts/v1/tokens");

        let creds = Credentials::client(KEY, SECRET).with_accounts_url("accounts.waylay.io/");
        let request = token_request(&creds).unwrap();
        assert_eq!(request.url, "https://accounts.waylay.io/tokens");

        let creds = Credentials::client(KEY, SECRET).with_gateway_url("http://localhost:8080");
        let request = token_request(&creds).unwrap();
        assert_eq!(request.url, "http://localhost:8080/accounts/v1/tokens");
    }

    #[test]
    fn test_token_request_needs_endpoint() {
        let result = token_request(&Credentials::client(KEY, SECRET));
        assert!(matches!(result, Err(AuthError::NoEndpoint(_))));
    }

    #[tokio::test]
    async fn test_client_credentials_exchange_is_cached() {
        let server = MockServer::start().await;
        let token = valid_token();
        Mock::given(method("POST"))
            .and(path("/accounts/v1/tokens"))
            .and(query_param("grant_type", "client_credentials"))
            .and(body_json(json!({"clientId": KEY, "clientSecret": SECRET})))
            .respond_with(token_response(&token))
            .expect(1)
            .mount(&server)
            .await;

        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        let first = auth.assure_valid_token_async().await.unwrap();
        let second = auth.assure_valid_token_async().await.unwrap();
        assert_eq!(first.as_str(), token);
        assert_eq!(first, second);
        assert_eq!(auth.current_token(), Some(first));
    }

    #[tokio::test]
    async fn test_application_credentials_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tokens"))
            .and(query_param("grant_type", "application_credentials"))
            .and(query_param("tenant", "tenant-1"))
            .respond_with(token_response(&valid_token()))
            .expect(1)
            .mount(&server)
            .await;

        let auth = WaylayTokenAuth::new(
            Credentials::application(KEY, SECRET, "tenant-1").with_accounts_url(server.uri()),
        );
        let token = auth.assure_valid_token_async().await.unwrap();
        assert_eq!(token.tenant(), Some("tenant-1"));
    }

    #[tokio::test]
    async fn test_invalid_cached_token_is_replaced() {
        let server = MockServer::start().await;
        // passes validation, but without subject and domain it is never valid for reuse
        let partial = unsigned_token(&json!({
            "tenant": "tenant-1",
            "exp": Utc::now().timestamp() + 3600,
        }));
        Mock::given(method("POST"))
            .and(path("/accounts/v1/tokens"))
            .respond_with(token_response(&partial))
            .expect(2)
            .mount(&server)
            .await;

        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        auth.assure_valid_token_async().await.unwrap();
        auth.assure_valid_token_async().await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_failure_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        let err = auth.assure_valid_token_async().await.unwrap_err();
        assert!(err.is_exchange_failure());
        assert_eq!(err.to_string(), "could not obtain waylay token");
        assert!(std::error::Error::source(&err).is_some());
        assert!(auth.current_token().is_none());
    }

    #[tokio::test]
    async fn test_response_without_token_is_exchange_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"other": 1})))
            .mount(&server)
            .await;

        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        let err = auth.assure_valid_token_async().await.unwrap_err();
        assert!(err.is_exchange_failure());
    }

    #[tokio::test]
    async fn test_no_credentials_without_callback() {
        let auth = WaylayTokenAuth::new(Credentials::none());
        let err = auth.assure_valid_token_async().await.unwrap_err();
        assert_eq!(err.to_string(), "No credentials or credentials_callback provided.");
    }

    #[tokio::test]
    async fn test_callback_resolves_credentials() {
        let token = valid_token();
        let issued = token.clone();
        let auth = WaylayTokenAuth::new(Credentials::none().with_accounts_url("https://accounts.example"))
            .with_callback(move |hint| {
                assert_eq!(hint, Some("https://accounts.example"));
                Ok(Credentials::token(issued.clone()))
            });

        let resolved = auth.assure_valid_token_async().await.unwrap();
        assert_eq!(resolved.as_str(), token);
        assert_eq!(auth.credentials().credentials_type(), CredentialsType::Token);
    }

    #[tokio::test]
    async fn test_callback_returning_no_credentials_is_unsupported() {
        let auth = WaylayTokenAuth::new(Credentials::none())
            .with_callback(|_| Ok(Credentials::none()));
        let err = auth.assure_valid_token_async().await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedCredentials(_)));
    }

    #[tokio::test]
    async fn test_only_exchanged_tokens_are_announced() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(InfoMessages(Arc::clone(&messages))),
        );

        let issued = WaylayTokenAuth::new(Credentials::token(valid_token()));
        issued.assure_valid_token_async().await.unwrap();
        assert!(messages.lock().unwrap().is_empty());

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts/v1/tokens"))
            .respond_with(token_response(&valid_token()))
            .mount(&server)
            .await;
        let exchanged =
            WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        exchanged.assure_valid_token_async().await.unwrap();
        assert_eq!(
            *messages.lock().unwrap(),
            vec!["Obtained new waylay token".to_string()]
        );
    }

    #[tokio::test]
    async fn test_expired_issued_token() {
        let expired = unsigned_token(&json!({
            "tenant": "t", "domain": "d", "sub": "s",
            "exp": Utc::now().timestamp() - 60,
        }));
        let auth = WaylayTokenAuth::new(Credentials::token(expired));
        let err = auth.assure_valid_token_async().await.unwrap_err();
        assert!(err.is_expired());
    }

    #[tokio::test]
    async fn test_set_credentials_drops_cached_token() {
        let auth = WaylayTokenAuth::new(Credentials::token(valid_token()));
        auth.assure_valid_token_async().await.unwrap();
        assert!(auth.current_token().is_some());
        auth.set_credentials(Credentials::none());
        assert!(auth.current_token().is_none());
    }

    #[tokio::test]
    async fn test_authenticate_sets_bearer_header() {
        let token = valid_token();
        let auth = WaylayTokenAuth::new(Credentials::token(token.clone()));
        let mut request = reqwest::Request::new(
            reqwest::Method::GET,
            "https://api.waylay.io/".parse().unwrap(),
        );
        auth.authenticate(&mut request).await.unwrap();
        assert_eq!(
            request.headers()[AUTHORIZATION].to_str().unwrap(),
            format!("Bearer {}", token)
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET));
        assert!(!format!("{:?}", auth).contains(SECRET));
    }

    // Blocking tests run on plain threads; the mock server lives on a private runtime.

    #[cfg(feature = "blocking")]
    #[test]
    fn test_blocking_exchange_matches_async() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let token = valid_token();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/accounts/v1/tokens"))
                .and(query_param("grant_type", "client_credentials"))
                .respond_with(token_response(&token))
                .expect(1)
                .mount(&server)
                .await;
            server
        });

        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        let first = auth.assure_valid_token().unwrap();
        let second = auth.assure_valid_token().unwrap();
        assert_eq!(first.as_str(), token);
        assert_eq!(first, second);

        let mut request = reqwest::blocking::Request::new(
            reqwest::Method::GET,
            "https://api.waylay.io/".parse().unwrap(),
        );
        auth.authenticate_blocking(&mut request).unwrap();
        assert!(request.headers().contains_key(AUTHORIZATION));

        drop(auth);
        rt.block_on(server.verify());
    }

    #[cfg(feature = "blocking")]
    #[test]
    fn test_blocking_errors_match_async() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;
            server
        });

        let auth = WaylayTokenAuth::new(Credentials::client(KEY, SECRET).with_gateway_url(server.uri()));
        let blocking = auth.assure_valid_token().unwrap_err();
        let non_blocking = rt.block_on(auth.assure_valid_token_async()).unwrap_err();
        assert_eq!(blocking.to_string(), non_blocking.to_string());
        assert!(blocking.is_exchange_failure());

        let none = WaylayTokenAuth::new(Credentials::none());
        assert!(matches!(none.assure_valid_token(), Err(AuthError::NoCredentials)));
    }
}
