//! Waylay bearer tokens.
//!
//! Tokens are JWTs issued by the accounts service. The claims are decoded
//! without signature verification: checking the signature is the job of the
//! server that receives the token.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value, json};

use crate::error::{AuthError, Result};

/// A raw token string together with its decoded claims.
#[derive(Clone, PartialEq)]
pub struct WaylayToken {
    token_string: String,
    claims: Map<String, Value>,
}

impl WaylayToken {
    /// Decode a token string into its claims.
    pub fn parse(token_string: impl Into<String>) -> Result<Self> {
        let token_string = token_string.into();
        let claims = decode_claims(&token_string)?;
        Ok(Self {
            token_string,
            claims,
        })
    }

    /// Create a token holder from already decoded claims.
    pub fn from_parts(token_string: impl Into<String>, claims: Map<String, Value>) -> Self {
        Self {
            token_string: token_string.into(),
            claims,
        }
    }

    /// Verify the essential claims and the expiry state.
    pub fn validate(self) -> Result<Self> {
        if self.token_string.is_empty() {
            return Err(AuthError::NoToken);
        }
        if self.claims.is_empty() {
            return Err(AuthError::EmptyClaims);
        }
        if self.tenant().is_none() {
            return Err(AuthError::InvalidToken);
        }
        if self.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        Ok(self)
    }

    /// The raw token string.
    pub fn as_str(&self) -> &str {
        &self.token_string
    }

    /// All decoded claims.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Tenant id asserted by the token.
    pub fn tenant(&self) -> Option<&str> {
        self.str_claim("tenant")
    }

    /// Waylay domain asserted by the token.
    pub fn domain(&self) -> Option<&str> {
        self.str_claim("domain")
    }

    /// Subject asserted by the token.
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// Licenses asserted by the token.
    pub fn licenses(&self) -> Vec<String> {
        self.list_claim("licenses")
    }

    /// Groups asserted by the token.
    pub fn groups(&self) -> Vec<String> {
        self.list_claim("groups")
    }

    /// Permissions asserted by the token.
    pub fn permissions(&self) -> Vec<String> {
        self.list_claim("permissions")
    }

    /// Expiry timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_claim("exp")
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    /// Issuance timestamp.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_claim("iat")
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    /// Seconds until expiry, negative once expired.
    pub fn expires_seconds(&self) -> Option<i64> {
        self.timestamp_claim("exp").map(|exp| exp - now_ts())
    }

    /// Seconds since issuance.
    pub fn age(&self) -> i64 {
        now_ts() - self.timestamp_claim("iat").unwrap_or(0)
    }

    /// True unless the expiry lies strictly in the future.
    pub fn is_expired(&self) -> bool {
        match self.expires_seconds() {
            Some(seconds) => seconds <= 0,
            None => true,
        }
    }

    /// True if tenant, subject and domain are asserted and the token has not expired.
    pub fn is_valid(&self) -> bool {
        self.tenant().is_some()
            && self.subject().is_some()
            && self.domain().is_some()
            && !self.is_expired()
    }

    /// Summary of the main token attributes.
    pub fn to_dict(&self) -> Value {
        json!({
            "tenant": self.tenant(),
            "domain": self.domain(),
            "subject": self.subject(),
            "expires_at": self.expires_at().map(|at| at.to_rfc3339()),
            "is_valid": self.is_valid(),
        })
    }

    fn str_claim(&self, key: &str) -> Option<&str> {
        self.claims.get(key).and_then(Value::as_str)
    }

    fn list_claim(&self, key: &str) -> Vec<String> {
        self.claims
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn timestamp_claim(&self, key: &str) -> Option<i64> {
        let value = self.claims.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|ts| ts as i64))
    }
}

impl fmt::Display for WaylayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token_string)
    }
}

impl fmt::Debug for WaylayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<WaylayToken({})>", self.to_dict())
    }
}

fn decode_claims(token_string: &str) -> Result<Map<String, Value>> {
    let mut segments = token_string.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(AuthError::TokenParse("not enough segments".to_string())),
    };
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::TokenParse(format!("invalid payload encoding: {}", e)))?;
    match serde_json::from_slice::<Value>(&decoded) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(AuthError::TokenParse("payload is not a json object".to_string())),
        Err(e) => Err(AuthError::TokenParse(format!("invalid payload: {}", e))),
    }
}

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// Build an unsigned token carrying the given claims (test helper).
#[cfg(test)]
pub(crate) fn unsigned_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}
