//! Client error types.

use std::fmt;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use thiserror::Error;
use waylay_auth::AuthError;

use crate::value::Decoded;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP method outside the supported set.
    #[error("Method {0} is not supported.")]
    InvalidMethod(String),

    /// A request argument that cannot be used.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A body that cannot be encoded with the requested content type.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// A value that is not a member of the target enumeration.
    #[error("Failed to parse `{value}` as `{enum_name}`")]
    InvalidEnumValue {
        /// Received value, rendered as json.
        value: String,
        /// Name of the enumeration.
        enum_name: String,
    },

    /// A path selector that does not parse.
    #[error("Invalid select path `{path}`: {reason}")]
    InvalidSelector {
        /// The selector as given.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// Credentials could not be turned into a valid token.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Server returned a non-2xx response.
    #[error("{0}")]
    Api(Box<ApiError>),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stream error.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every conversion strategy failed for a payload.
    #[error("Cannot convert payload into {shape}: {reason}")]
    ConversionExhausted {
        /// Name of the target shape.
        shape: String,
        /// Failure of the last strategy.
        reason: String,
    },
}

impl Error {
    /// HTTP status of an api error, or of a transport error that carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_)) || self.status() == Some(401)
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(status) if status >= 500)
    }

    /// The api error details, if this is an api error.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Api(Box::new(err))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A non-2xx response, with its decoded body.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Summary message.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase of the status.
    pub reason: Option<String>,
    /// Request method.
    pub method: String,
    /// Request url.
    pub url: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub content: Bytes,
    /// Body decoded with the response type of the status code, if decoding succeeded.
    pub data: Option<Decoded>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.message)?;
        writeln!(
            f,
            "  Status: {} {}",
            self.status,
            self.reason.as_deref().unwrap_or("")
        )?;
        writeln!(f, "  Request: {} {}", self.method, self.url)?;
        write!(f, "  Headers:")?;
        for (name, value) in &self.headers {
            write!(
                f,
                "\n    {}: {}",
                name,
                value.to_str().unwrap_or("<binary>")
            )?;
        }
        match &self.data {
            Some(data) => write!(f, "\n  Response data: {}", data.to_value()),
            None => write!(
                f,
                "\n  Response content: {}",
                String::from_utf8_lossy(&self.content)
            ),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};
    use serde_json::json;

    fn api_error(status: u16, data: Option<Decoded>) -> Error {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        ApiError {
            message: "Error response.".to_string(),
            status,
            reason: Some("Not Found".to_string()),
            method: "GET".to_string(),
            url: "https://api.waylay.io/resources/v1/r1".to_string(),
            headers,
            content: Bytes::from_static(br#"{"error":"gone"}"#),
            data,
        }
        .into()
    }

    #[test]
    fn test_predicates() {
        assert!(api_error(404, None).is_not_found());
        assert!(api_error(401, None).is_auth_error());
        assert!(api_error(429, None).is_rate_limited());
        assert!(api_error(503, None).is_server_error());
        assert!(!api_error(404, None).is_server_error());
        assert!(Error::Auth(AuthError::NoToken).is_auth_error());
        assert_eq!(Error::InvalidMethod("FOO".into()).status(), None);
    }

    #[test]
    fn test_api_error_renders_full_diagnostic() {
        let data = Decoded::from_json(&json!({"error": "gone"}));
        let rendered = api_error(404, Some(data)).to_string();
        assert!(rendered.starts_with("Error response.\n"));
        assert!(rendered.contains("Status: 404 Not Found"));
        assert!(rendered.contains("Request: GET https://api.waylay.io/resources/v1/r1"));
        assert!(rendered.contains("content-type: application/json"));
        assert!(rendered.contains(r#"Response data: {"error":"gone"}"#));
    }

    #[test]
    fn test_api_error_without_data_shows_raw_content() {
        let rendered = api_error(500, None).to_string();
        assert!(rendered.contains(r#"Response content: {"error":"gone"}"#));
    }

    #[test]
    fn test_invalid_method_message() {
        assert_eq!(
            Error::InvalidMethod("FETCH".into()).to_string(),
            "Method FETCH is not supported."
        );
    }
}
