//! HTTP client SDK for the Waylay platform.
//!
//! This crate provides the request/response pipeline that Waylay service
//! clients are built on: requests are assembled by a [`RequestBuilder`],
//! authenticated with a Waylay token, sent, and their responses decoded
//! into declared shapes.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use waylay_client::{
//!     ApiClient, AuthUrls, FieldSpec, ModelSpec, ResponseType, Result, Settings,
//!     StreamResponse, TypeMapping, WaylayConfig,
//! };
//!
//! # async fn example() -> Result<()> {
//! let config = WaylayConfig::from_client_credentials(
//!     "0123456789abcdef01234567",
//!     "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3",
//!     AuthUrls::gateway("api.waylay.io"),
//!     Settings::new(),
//! );
//! let client = ApiClient::from_config(&config)?;
//!
//! // Decode a response into a declared model
//! let resource = ResponseType::model(
//!     ModelSpec::new("Resource")
//!         .field(FieldSpec::required("id", ResponseType::Str))
//!         .field(FieldSpec::optional("name", ResponseType::Str)),
//! );
//! let decoded = client
//!     .get("/resources/v1/resources/{id}")
//!     .path_param("id", "sensor-1")
//!     .response_type(TypeMapping::new().with("200", resource))
//!     .send()
//!     .await?;
//! println!("{:?}", decoded.as_model().and_then(|m| m.get("name")));
//!
//! // Stream events
//! if let StreamResponse::Events(mut events) = client
//!     .get("/data/v1/events")
//!     .select_path("data")
//!     .send_stream()
//!     .await?
//! {
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Response decoding
//!
//! Each call declares a [`TypeMapping`] from status codes to shapes. A
//! payload that does not validate against its shape degrades step by step
//! (relaxed model, generic [`Document`], raw json) with a warning logged
//! at each step. Non-2xx responses are decoded the same way and returned
//! as [`Error::Api`].

pub mod client;
pub mod config;
pub mod deserialize;
pub mod error;
pub mod request;
pub mod select;
pub mod shape;
pub mod stream;
pub mod value;

#[cfg(test)]
mod test_support;

pub use client::{ApiClient, ClientBuilder, DEFAULT_STREAM_TIMEOUT, DEFAULT_TIMEOUT};
pub use config::{AuthUrls, HttpOptions, Settings, WaylayConfig};
pub use deserialize::{RawResponse, convert, deserialize_response};
pub use error::{ApiError, Error, Result};
pub use request::{ApiRequest, Content, FilePart, RequestBuilder, StreamResponse, Timeout};
pub use select::Selector;
pub use shape::{EnumSpec, FieldSpec, ModelSpec, ResponseType, TypeMapping};
pub use stream::{EventFormat, EventStream};
pub use value::{Decoded, Document, Field, ModelInstance};

// Re-export the auth types used to configure clients
pub use waylay_auth::{AuthError, Credentials, CredentialsType, WaylayToken, WaylayTokenAuth};
