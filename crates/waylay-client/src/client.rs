//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;
use waylay_auth::SharedAuth;

use crate::config::WaylayConfig;
use crate::error::{Error, Result};
use crate::request::RequestBuilder;

/// Default timeout for requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for streaming requests.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Waylay API client.
///
/// Builds, authenticates and sends requests, and decodes their responses.
/// Cloning is cheap: clones share the connection pool and the token cache.
///
/// # Example
///
/// ```no_run
/// use waylay_client::{ApiClient, AuthUrls, ResponseType, Settings, WaylayConfig};
///
/// # async fn example() -> waylay_client::Result<()> {
/// let config = WaylayConfig::from_client_credentials(
///     "0123456789abcdef01234567",
///     "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3",
///     AuthUrls::gateway("api.waylay.io"),
///     Settings::new(),
/// );
/// let client = ApiClient::from_config(&config)?;
///
/// let resources = client
///     .request("GET", "/resources/v1/resources")
///     .query(&[("limit", 10)])
///     .response_type(ResponseType::Document)
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Base URL for relative resource paths.
    pub(crate) base_url: Url,
    /// Authenticator applied to every request.
    pub(crate) auth: Option<SharedAuth>,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Per-read timeout of streaming requests.
    pub(crate) stream_timeout: Duration,
}

impl ApiClient {
    /// Get access to the inner client state.
    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }
}

impl ApiClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for the gateway of a configuration, authenticated
    /// with its token provider.
    pub fn from_config(config: &WaylayConfig) -> Result<Self> {
        let gateway = config
            .gateway_url()
            .ok_or_else(|| Error::Config("no gateway url configured".to_string()))?;
        let http = config.http_options();
        let mut builder = Self::builder()
            .base_url(gateway)
            .auth(config.auth() as SharedAuth)
            .timeout(http.timeout)
            .stream_timeout(http.stream_timeout)
            .user_agent(http.user_agent.clone());
        for (name, value) in &http.default_headers {
            builder = builder.default_header(name.clone(), value.clone());
        }
        builder.build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Whether requests are authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.inner.auth.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request builders
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a request.
    ///
    /// The method is validated when the request is built; `resource_path`
    /// may hold `{name}` placeholders, and is resolved against the base url
    /// unless it is absolute.
    pub fn request(&self, method: &str, resource_path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, resource_path)
    }

    /// Start a GET request.
    pub fn get(&self, resource_path: &str) -> RequestBuilder {
        self.request("GET", resource_path)
    }

    /// Start a POST request.
    pub fn post(&self, resource_path: &str) -> RequestBuilder {
        self.request("POST", resource_path)
    }

    /// Start a PUT request.
    pub fn put(&self, resource_path: &str) -> RequestBuilder {
        self.request("PUT", resource_path)
    }

    /// Start a PATCH request.
    pub fn patch(&self, resource_path: &str) -> RequestBuilder {
        self.request("PATCH", resource_path)
    }

    /// Start a DELETE request.
    pub fn delete(&self, resource_path: &str) -> RequestBuilder {
        self.request("DELETE", resource_path)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a resource path against the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(Error::from);
        }
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Authenticate and send a request.
    pub(crate) async fn execute(&self, mut request: reqwest::Request) -> Result<reqwest::Response> {
        if let Some(auth) = &self.inner.auth {
            auth.authenticate(&mut request).await?;
        }
        tracing::debug!(method = %request.method(), url = %request.url(), "Sending request");
        Ok(self.inner.http.execute(request).await?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("auth", &self.inner.auth)
            .field("timeout", &self.inner.timeout)
            .field("stream_timeout", &self.inner.stream_timeout)
            .finish()
    }
}

/// Builder for creating an ApiClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    auth: Option<SharedAuth>,
    timeout: Duration,
    stream_timeout: Duration,
    user_agent: Option<String>,
    default_headers: Vec<(String, String)>,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            user_agent: None,
            default_headers: Vec::new(),
            http: None,
        }
    }

    /// Set the base URL. A bare host name means `https://<host>`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request authenticator.
    pub fn auth(mut self, auth: SharedAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout of streaming requests, applied to each read of the body.
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Use a preconfigured transport. User agent and default headers are
    /// then left to that client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let base_url = if base_url.contains("://") {
            base_url
        } else {
            format!("https://{}", base_url)
        };
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut headers = HeaderMap::new();
                for (name, value) in &self.default_headers {
                    let name = HeaderName::from_bytes(name.as_bytes())
                        .map_err(|_| Error::Config(format!("Invalid header name: {}", name)))?;
                    let value = HeaderValue::from_str(value)
                        .map_err(|_| Error::Config(format!("Invalid value for header {}", name)))?;
                    headers.insert(name, value);
                }
                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("waylay-sdk/rust/{}", env!("CARGO_PKG_VERSION")));
                reqwest::Client::builder()
                    .default_headers(headers)
                    .user_agent(user_agent)
                    .build()?
            }
        };

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                auth: self.auth,
                timeout: self.timeout,
                stream_timeout: self.stream_timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
