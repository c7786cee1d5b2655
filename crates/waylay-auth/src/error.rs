//! Error types for credential and token handling.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors raised while resolving credentials into a valid bearer token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Neither concrete credentials nor a callback to resolve them.
    #[error("No credentials or credentials_callback provided.")]
    NoCredentials,

    /// Credentials that cannot be used to obtain a token.
    #[error("credentials of type {0} are not supported")]
    UnsupportedCredentials(String),

    /// Key/secret credentials without a gateway or accounts url.
    #[error("no gateway_url or accounts_url configured for {0}")]
    NoEndpoint(String),

    /// Empty token string.
    #[error("no token")]
    NoToken,

    /// The token could not be decoded into claims.
    #[error("could not decode token: {0}")]
    TokenParse(String),

    /// The token decoded into an empty claim set.
    #[error("could not parse token data")]
    EmptyClaims,

    /// Essential claims are missing.
    #[error("invalid token")]
    InvalidToken,

    /// The token expiry is not in the future.
    #[error("token expired")]
    TokenExpired,

    /// The token exchange with the accounts endpoint failed.
    #[error("could not obtain waylay token")]
    Exchange(#[source] reqwest::Error),

    /// A credentials document could not be parsed.
    #[error("invalid json for credentials: {0}")]
    InvalidCredentials(String),
}

impl AuthError {
    /// Whether this error signals a token that was valid once but has expired.
    pub fn is_expired(&self) -> bool {
        matches!(self, AuthError::TokenExpired)
    }

    /// Whether this error comes from the network exchange rather than from
    /// the credentials or token themselves.
    pub fn is_exchange_failure(&self) -> bool {
        matches!(self, AuthError::Exchange(_))
    }
}
