//! Request building and dispatch.
//!
//! A [`RequestBuilder`] collects the parts of one api call: path
//! parameters, query, headers, a body and the expected response shapes.
//! Argument errors are deferred until [`RequestBuilder::build`], which
//! reports them before any I/O happens.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, multipart};
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::deserialize::{RawResponse, deserialize_response};
use crate::error::{Error, Result};
use crate::select::Selector;
use crate::shape::TypeMapping;
use crate::stream::{EventFormat, EventStream};
use crate::value::Decoded;

/// Methods accepted by [`RequestBuilder`].
pub const SUPPORTED_METHODS: [&str; 7] = ["GET", "HEAD", "DELETE", "POST", "PUT", "PATCH", "OPTIONS"];

/// Chunk size used to stream [`Content::Reader`] bodies.
pub const READ_CHUNK_SIZE: usize = 65_536;

const APPLICATION_JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Parse and validate a method name, case-insensitively.
pub fn parse_method(method: &str) -> Result<Method> {
    let upper = method.trim().to_ascii_uppercase();
    if !SUPPORTED_METHODS.contains(&upper.as_str()) {
        return Err(Error::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| Error::InvalidMethod(method.to_string()))
}

// ============================================================================
// Bodies
// ============================================================================

/// Raw request content, sent as-is.
pub enum Content {
    Bytes(Bytes),
    Text(String),
    /// Chunks sent in order, without buffering them into one body.
    Chunks(Vec<Bytes>),
    /// An async stream of chunks.
    Stream(BoxStream<'static, std::io::Result<Bytes>>),
    /// A blocking reader, read in [`READ_CHUNK_SIZE`] chunks off the runtime threads.
    Reader(Box<dyn Read + Send>),
}

impl Content {
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Content::Reader(Box::new(reader))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Content::Stream(stream.boxed())
    }

    /// Whether the content is binary (everything but text).
    fn is_binary(&self) -> bool {
        !matches!(self, Content::Text(_))
    }

    fn into_body(self) -> reqwest::Body {
        match self {
            Content::Bytes(bytes) => reqwest::Body::from(bytes),
            Content::Text(text) => reqwest::Body::from(text),
            Content::Chunks(chunks) => reqwest::Body::wrap_stream(futures::stream::iter(
                chunks.into_iter().map(Ok::<_, std::io::Error>),
            )),
            Content::Stream(stream) => reqwest::Body::wrap_stream(stream),
            Content::Reader(reader) => reqwest::Body::wrap_stream(read_chunks(reader)),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Content {
    fn from(bytes: &'static [u8]) -> Self {
        Content::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Bytes(bytes) => write!(f, "Content::Bytes({} bytes)", bytes.len()),
            Content::Text(text) => write!(f, "Content::Text({} chars)", text.len()),
            Content::Chunks(chunks) => write!(f, "Content::Chunks({} chunks)", chunks.len()),
            Content::Stream(_) => f.write_str("Content::Stream"),
            Content::Reader(_) => f.write_str("Content::Reader"),
        }
    }
}

fn read_chunks(reader: Box<dyn Read + Send>) -> BoxStream<'static, std::io::Result<Bytes>> {
    futures::stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let read = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            let read = reader.read(&mut buf).map(|n| {
                buf.truncate(n);
                buf
            });
            (reader, read)
        })
        .await;
        match read {
            Ok((_, Ok(buf))) if buf.is_empty() => None,
            Ok((reader, Ok(buf))) => Some((Ok(Bytes::from(buf)), Some(reader))),
            Ok((_, Err(e))) => Some((Err(e), None)),
            Err(e) => Some((Err(std::io::Error::other(e)), None)),
        }
    })
    .boxed()
}

/// A file attachment of a multipart request.
#[derive(Debug, Clone)]
pub struct FilePart {
    field: String,
    file_name: Option<String>,
    mime: Option<String>,
    content: Bytes,
}

impl FilePart {
    pub fn new(field: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            field: field.into(),
            file_name: None,
            mime: None,
            content: content.into(),
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    fn into_part(self) -> Result<(String, multipart::Part)> {
        let mut part = multipart::Part::stream(self.content);
        if let Some(name) = self.file_name {
            part = part.file_name(name);
        }
        if let Some(mime) = self.mime {
            part = part.mime_str(&mime)?;
        }
        Ok((self.field, part))
    }
}

/// Per-call timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// One bound for the whole call.
    Uniform(Duration),
    /// Separate phases. The call is bounded by the sum of connect, read and
    /// write; `pool` is not enforced by the transport.
    Split {
        connect: Option<Duration>,
        read: Option<Duration>,
        write: Option<Duration>,
        pool: Option<Duration>,
    },
}

impl Timeout {
    /// The bound applied to the call, if any.
    pub fn total(&self) -> Option<Duration> {
        match self {
            Timeout::Uniform(d) => Some(*d),
            Timeout::Split {
                connect,
                read,
                write,
                ..
            } => [connect, read, write]
                .into_iter()
                .flatten()
                .copied()
                .reduce(|a, b| a + b),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::Uniform(d)
    }
}

// ============================================================================
// RequestBuilder
// ============================================================================

/// A built request, with how its response is to be decoded.
#[derive(Debug)]
pub struct ApiRequest {
    request: reqwest::Request,
    response_type: TypeMapping,
    selector: Option<Selector>,
}

impl ApiRequest {
    pub fn request(&self) -> &reqwest::Request {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn url(&self) -> &url::Url {
        self.request.url()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// The body, if it is held in memory.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.request.body().and_then(reqwest::Body::as_bytes)
    }

    pub fn response_type(&self) -> &TypeMapping {
        &self.response_type
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub fn into_parts(self) -> (reqwest::Request, TypeMapping, Option<Selector>) {
        (self.request, self.response_type, self.selector)
    }
}

/// The result of [`RequestBuilder::send_stream`].
#[derive(Debug)]
pub enum StreamResponse {
    /// The response is an event stream.
    Events(EventStream),
    /// Any other response, decoded as a whole.
    Value(Decoded),
}

/// Builder for one api call.
#[derive(Debug)]
pub struct RequestBuilder {
    client: ApiClient,
    method: String,
    resource_path: String,
    path_params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    raw_query: Vec<(String, String)>,
    headers: HeaderMap,
    json: Option<Value>,
    form: Option<Value>,
    content: Option<Content>,
    files: Vec<FilePart>,
    timeout: Option<Timeout>,
    response_type: TypeMapping,
    select_path: Option<String>,
    error: Option<Error>,
}

impl RequestBuilder {
    pub(crate) fn new(client: ApiClient, method: &str, resource_path: &str) -> Self {
        Self {
            client,
            method: method.to_string(),
            resource_path: resource_path.to_string(),
            path_params: Vec::new(),
            query: Vec::new(),
            raw_query: Vec::new(),
            headers: HeaderMap::new(),
            json: None,
            form: None,
            content: None,
            files: Vec::new(),
            timeout: None,
            response_type: TypeMapping::default(),
            select_path: None,
            error: None,
        }
    }

    fn fail(mut self, error: Error) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// Substitute a `{name}` placeholder of the resource path.
    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.push((name.into(), value.to_string()));
        self
    }

    pub fn path_params<K, V>(self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        params
            .into_iter()
            .fold(self, |builder, (name, value)| builder.path_param(name, value))
    }

    /// Add structured query parameters.
    ///
    /// `query` must serialize to a map or a sequence of pairs. Scalars
    /// render as strings, lists repeat the key, nulls are dropped and
    /// nested objects are sent as json.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        match serde_json::to_value(query)
            .map_err(Error::from)
            .and_then(|value| flatten_params(&value))
        {
            Ok(pairs) => {
                self.query.extend(pairs);
                self
            }
            Err(e) => self.fail(e),
        }
    }

    /// Add query parameters as given. They replace structured parameters
    /// with the same name.
    pub fn raw_query<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.raw_query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => return self.fail(Error::InvalidArgument(format!("invalid header name `{}`", name))),
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
                self
            }
            Err(_) => self.fail(Error::InvalidArgument(format!("invalid value for header `{}`", name))),
        }
    }

    pub fn headers<'a>(self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    /// Set a json-encodable body.
    ///
    /// It is sent as json, or as form fields if the content type says so.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.json = Some(value);
                self
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Set form fields, sent url-encoded or as multipart fields.
    pub fn form<T: Serialize + ?Sized>(mut self, fields: &T) -> Self {
        match serde_json::to_value(fields) {
            Ok(value) => {
                self.form = Some(value);
                self
            }
            Err(e) => self.fail(e.into()),
        }
    }

    /// Set raw content, which takes precedence over any other body.
    pub fn content(mut self, content: impl Into<Content>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Attach a file; the request becomes multipart.
    pub fn file(mut self, file: FilePart) -> Self {
        self.files.push(file);
        self
    }

    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Declare the response shapes, per status code.
    pub fn response_type(mut self, mapping: impl Into<TypeMapping>) -> Self {
        self.response_type = mapping.into();
        self
    }

    /// Select part of the parsed payload before it is converted.
    pub fn select_path(mut self, path: impl Into<String>) -> Self {
        self.select_path = Some(path.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Building
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the request without sending it.
    pub fn build(self) -> Result<ApiRequest> {
        let timeout = self
            .timeout
            .and_then(|t| t.total())
            .unwrap_or(self.client.inner().timeout);
        self.build_with_deadline(Some(timeout))
    }

    /// Build a streaming request. It carries no overall deadline; the
    /// returned timeout bounds the wait for the response and for each read.
    fn build_stream(self) -> Result<(ApiRequest, Duration)> {
        let read_timeout = self
            .timeout
            .and_then(|t| t.total())
            .unwrap_or(self.client.inner().stream_timeout);
        Ok((self.build_with_deadline(None)?, read_timeout))
    }

    fn build_with_deadline(self, deadline: Option<Duration>) -> Result<ApiRequest> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let method = parse_method(&self.method)?;
        let selector = self.select_path.as_deref().map(Selector::parse).transpose()?;

        let mut url = self.client.url(&interpolate(&self.resource_path, &self.path_params))?;
        let query = merge_query(self.query, self.raw_query);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(&query);
        }

        let mut headers = self.headers;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type);

        let mut builder = self.client.inner().http.request(method, url);
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline);
        }

        if let Some(content) = self.content {
            if content.is_binary() && content_type.is_none() {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
            }
            builder = builder.headers(headers).body(content.into_body());
        } else if !self.files.is_empty() || content_type.as_deref() == Some(MULTIPART_FORM_DATA) {
            // the transport sets the content type with its boundary
            headers.remove(CONTENT_TYPE);
            let mut form = multipart::Form::new();
            if let Some(fields) = self.form.as_ref().or(self.json.as_ref()) {
                for (name, value) in flatten_params(fields)? {
                    form = form.text(name, value);
                }
            }
            for file in self.files {
                let (field, part) = file.into_part()?;
                form = form.part(field, part);
            }
            builder = builder.headers(headers).multipart(form);
        } else if content_type.as_deref() == Some(FORM_URLENCODED) || self.form.is_some() {
            let fields = match self.form.as_ref().or(self.json.as_ref()) {
                Some(fields) => flatten_params(fields)?,
                None => Vec::new(),
            };
            builder = builder.headers(headers).form(&fields);
        } else if let Some(body) = self.json {
            if let Some(content_type) = content_type.filter(|ct| !is_json(ct)) {
                return Err(Error::UnsupportedContentType(format!(
                    "cannot encode a json body as {}",
                    content_type
                )));
            }
            builder = builder.headers(headers).json(&body);
        } else {
            builder = builder.headers(headers);
        }

        Ok(ApiRequest {
            request: builder.build()?,
            response_type: self.response_type,
            selector,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sending
    // ─────────────────────────────────────────────────────────────────────────

    /// Send the request and decode the response.
    ///
    /// Non-2xx responses are returned as [`Error::Api`].
    pub async fn send(self) -> Result<Decoded> {
        let client = self.client.clone();
        let (request, mapping, selector) = self.build()?.into_parts();
        let method = request.method().clone();
        let response = client.execute(request).await?;
        let raw = RawResponse::read(response, method).await?;
        deserialize_response(&raw, &mapping, selector.as_ref())
    }

    /// Send the request and stream the response events.
    ///
    /// A successful event stream or ndjson response yields its events one at
    /// a time, each decoded with the shape resolved from the status code.
    /// Any other response is decoded as a whole.
    ///
    /// The stream timeout (or the timeout of this call) bounds the wait for
    /// the response and for every read of its body, not the whole stream.
    pub async fn send_stream(self) -> Result<StreamResponse> {
        let client = self.client.clone();
        let (request, read_timeout) = self.build_stream()?;
        let (request, mapping, selector) = request.into_parts();
        let method = request.method().clone();
        let response = within(read_timeout, "waiting for the response", client.execute(request)).await?;

        let format = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(EventFormat::from_content_type);
        match format {
            Some(format) if response.status().is_success() => {
                let shape = mapping.resolve(response.status().as_u16()).clone();
                Ok(StreamResponse::Events(
                    EventStream::new(response, format, shape, selector).read_timeout(read_timeout),
                ))
            }
            _ => {
                let raw = within(read_timeout, "reading the response", RawResponse::read(response, method)).await?;
                deserialize_response(&raw, &mapping, selector.as_ref()).map(StreamResponse::Value)
            }
        }
    }

    /// Send the request and return the transport response as-is.
    pub async fn send_raw(self) -> Result<reqwest::Response> {
        let client = self.client.clone();
        let (request, _, _) = self.build()?.into_parts();
        client.execute(request).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn within<T>(
    timeout: Duration,
    what: &str,
    future: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| Error::Stream(format!("timed out after {:?} {}", timeout, what)))?
}

/// Substitute `{name}` placeholders with percent-encoded values.
/// Placeholders without a value are left in place.
fn interpolate(template: &str, params: &[(String, String)]) -> String {
    params.iter().fold(template.to_string(), |path, (name, value)| {
        path.replace(&format!("{{{}}}", name), &urlencoding::encode(value))
    })
}

fn merge_query(structured: Vec<(String, String)>, raw: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut merged: Vec<_> = structured
        .into_iter()
        .filter(|(key, _)| !raw.iter().any(|(raw_key, _)| raw_key == key))
        .collect();
    merged.extend(raw);
    merged
}

/// Flatten a json map (or list of pairs) into string parameters.
fn flatten_params(value: &Value) -> Result<Vec<(String, String)>> {
    let entries: Vec<(String, &Value)> = match value {
        Value::Null => Vec::new(),
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.as_array().map(Vec::as_slice) {
                Some([Value::String(k), v]) => Ok((k.clone(), v)),
                _ => Err(Error::InvalidArgument(format!(
                    "expected a (name, value) pair, got {}",
                    item
                ))),
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(Error::InvalidArgument(format!(
                "parameters must be a map, got {}",
                other
            )));
        }
    };
    let mut pairs = Vec::new();
    for (key, value) in entries {
        match value {
            Value::Null => {}
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| (key.clone(), param_string(item))),
            ),
            _ => pairs.push((key, param_string(value))),
        }
    }
    Ok(pairs)
}

fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The lowercased media type of a content type header, without parameters.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn is_json(media_type: &str) -> bool {
    media_type == APPLICATION_JSON || media_type.ends_with("+json")
}
