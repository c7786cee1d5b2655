//! Credentials, token model and bearer-token authentication for the Waylay SDK.
//!
//! # Components
//!
//! - [`credentials`]: credential variants, well-formedness and obfuscated serialization
//! - [`token`]: unverified token decoding and validity queries
//! - [`provider`]: credential to token resolution with caching and reactive refresh,
//!   for async and blocking callers

pub mod credentials;
pub mod error;
pub mod provider;
pub mod token;

pub use credentials::{Credentials, CredentialsType, OBFUSCATED};
pub use error::{AuthError, Result};
pub use provider::{CredentialsCallback, RequestAuth, SharedAuth, WaylayTokenAuth};
pub use token::WaylayToken;
