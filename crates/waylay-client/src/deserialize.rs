//! Type-directed response deserialization.
//!
//! A payload is converted into its declared [`ResponseType`] by trying a
//! fixed ladder of strategies, each more permissive than the previous:
//!
//! 1. strict validation against the declared shape (lax-but-lossless
//!    scalar coercion, unless a field is strict);
//! 2. relaxed construction: models are built from whatever fields are
//!    present, nested models are still attempted, degraded fields are kept
//!    as-is and missing ones are null;
//! 3. a generic [`Document`];
//! 4. the parsed json value, unconverted.
//!
//! Every step down the ladder is logged as a warning. Enumerations are the
//! exception: an unknown member fails immediately.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};

use crate::error::{ApiError, Error, Result};
use crate::select::Selector;
use crate::shape::{EnumSpec, ModelSpec, ResponseType, TypeMapping};
use crate::value::{Decoded, Document, ModelInstance};

/// Nesting limit for generic documents.
pub const MAX_DOCUMENT_DEPTH: usize = 128;

// ============================================================================
// Raw responses
// ============================================================================

/// A fully read response, with the request line it answers.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub method: Method,
    pub url: String,
    pub content: Bytes,
}

impl RawResponse {
    /// Read the full body of a transport response.
    pub async fn read(response: reqwest::Response, method: Method) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let content = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            method,
            url,
            content,
        })
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body as json, or as a json string holding the text if it does not parse.
    pub fn parsed(&self) -> Value {
        serde_json::from_slice(&self.content)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.content).into_owned()))
    }
}

/// Decode a response with the shape resolved from its status code.
///
/// Non-2xx responses are decoded the same way and returned as
/// [`Error::Api`], carrying the decoded body when decoding succeeded.
pub fn deserialize_response(
    response: &RawResponse,
    mapping: &TypeMapping,
    selector: Option<&Selector>,
) -> Result<Decoded> {
    let shape = mapping.resolve(response.status.as_u16());
    let decoded = decode_body(response, shape, selector);
    if response.is_success() {
        return decoded;
    }
    let data = match decoded {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(
                status = response.status.as_u16(),
                shape = %shape,
                error = %e,
                "Failed to decode error response body"
            );
            None
        }
    };
    Err(api_error(response, data))
}

pub(crate) fn api_error(response: &RawResponse, data: Option<Decoded>) -> Error {
    ApiError {
        message: "Error response.".to_string(),
        status: response.status.as_u16(),
        reason: response.status.canonical_reason().map(String::from),
        method: response.method.to_string(),
        url: response.url.clone(),
        headers: response.headers.clone(),
        content: response.content.clone(),
        data,
    }
    .into()
}

fn decode_body(
    response: &RawResponse,
    shape: &ResponseType,
    selector: Option<&Selector>,
) -> Result<Decoded> {
    if shape.is_bytes() {
        return Ok(Decoded::Bytes(response.content.clone()));
    }
    let data = match serde_json::from_slice::<Value>(&response.content) {
        Ok(Value::Null) => return Ok(Decoded::Bytes(response.content.clone())),
        Ok(value) => match selector {
            Some(selector) => selector.select(&value),
            None => value,
        },
        Err(_) => Value::String(String::from_utf8_lossy(&response.content).into_owned()),
    };
    convert(&data, shape)
}

// ============================================================================
// Conversion ladder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Validate,
    Relaxed,
    Document,
    Raw,
}

const LADDER: [Strategy; 4] = [
    Strategy::Validate,
    Strategy::Relaxed,
    Strategy::Document,
    Strategy::Raw,
];

impl Strategy {
    fn apply(self, data: &Value, shape: &ResponseType) -> std::result::Result<Decoded, Mismatch> {
        match self {
            Strategy::Validate => validate(data, shape, Mode::Lax, &mut Path::root()),
            Strategy::Relaxed => construct(data, shape, &mut Path::root()),
            Strategy::Document => to_document(data, &Path::root()),
            Strategy::Raw => Ok(Decoded::Raw(data.clone())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Validate => "validating deserializer",
            Strategy::Relaxed => "non-validating deserializer",
            Strategy::Document => "generic document deserializer",
            Strategy::Raw => "original data",
        })
    }
}

/// Convert a parsed payload into `shape`.
pub fn convert(data: &Value, shape: &ResponseType) -> Result<Decoded> {
    match shape {
        ResponseType::Any => return Ok(Decoded::Raw(data.clone())),
        ResponseType::Enum(spec) => return convert_enum(data, spec),
        _ => {}
    }
    let mut failure: Option<Mismatch> = None;
    for (step, strategy) in LADDER.iter().enumerate() {
        match strategy.apply(data, shape) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => {
                if let Some(next) = LADDER.get(step + 1) {
                    tracing::warn!(
                        shape = %shape,
                        error = %e,
                        "Failed to deserialize into {} with the {}, using the {} instead",
                        shape,
                        strategy,
                        next
                    );
                }
                failure = Some(e);
            }
        }
    }
    Err(Error::ConversionExhausted {
        shape: shape.to_string(),
        reason: failure.map(|e| e.to_string()).unwrap_or_default(),
    })
}

fn convert_enum(data: &Value, spec: &EnumSpec) -> Result<Decoded> {
    spec.lookup(data)
        .map(|member| Decoded::Enum {
            name: spec.name().to_string(),
            value: member.clone(),
        })
        .ok_or_else(|| Error::InvalidEnumValue {
            value: data.to_string(),
            enum_name: spec.name().to_string(),
        })
}

// ============================================================================
// Mismatches
// ============================================================================

/// Location inside the payload, for diagnostics.
#[derive(Debug, Clone, Default)]
struct Path(Vec<String>);

impl Path {
    fn root() -> Self {
        Self::default()
    }

    fn with<T>(&mut self, segment: String, f: impl FnOnce(&mut Path) -> T) -> T {
        self.0.push(segment);
        let result = f(self);
        self.0.pop();
        result
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        f.write_str("$")?;
        for segment in &self.0 {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// A payload that does not fit its shape.
#[derive(Debug, Clone)]
struct Mismatch {
    path: String,
    message: String,
}

impl Mismatch {
    fn new(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn expected(path: &Path, expected: &ResponseType, found: &Value) -> Self {
        Self::new(path, format!("expected {}, found {}", expected, kind_of(found)))
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Step 1: validation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Lax,
    Strict,
}

fn validate(
    data: &Value,
    shape: &ResponseType,
    mode: Mode,
    path: &mut Path,
) -> std::result::Result<Decoded, Mismatch> {
    let mismatch = |path: &Path| Mismatch::expected(path, shape, data);
    match shape {
        ResponseType::Str => data.as_str().map(|s| Decoded::Str(s.to_string())).ok_or_else(|| mismatch(path)),
        ResponseType::Int => to_int(data, mode).map(Decoded::Int).ok_or_else(|| mismatch(path)),
        ResponseType::Float => to_float(data, mode).map(Decoded::Float).ok_or_else(|| mismatch(path)),
        ResponseType::Bool => to_bool(data, mode).map(Decoded::Bool).ok_or_else(|| mismatch(path)),
        ResponseType::Date => to_date(data).map(Decoded::Date).ok_or_else(|| mismatch(path)),
        ResponseType::DateTime => to_datetime(data, mode).map(Decoded::DateTime).ok_or_else(|| mismatch(path)),
        ResponseType::Bytes => data
            .as_str()
            .map(|s| Decoded::Bytes(Bytes::copy_from_slice(s.as_bytes())))
            .ok_or_else(|| mismatch(path)),
        ResponseType::Any => Ok(Decoded::Raw(data.clone())),
        ResponseType::Document => to_document(data, path),
        ResponseType::List(item) => {
            let items = data.as_array().ok_or_else(|| mismatch(path))?;
            items
                .iter()
                .enumerate()
                .map(|(i, value)| path.with(format!("[{}]", i), |p| validate(value, item, mode, p)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Decoded::List)
        }
        ResponseType::Map(value_shape) => {
            let map = data.as_object().ok_or_else(|| mismatch(path))?;
            map.iter()
                .map(|(k, v)| {
                    path.with(format!(".{}", k), |p| validate(v, value_shape, mode, p))
                        .map(|decoded| (k.clone(), decoded))
                })
                .collect::<std::result::Result<IndexMap<_, _>, _>>()
                .map(Decoded::Map)
        }
        ResponseType::Union(options) => options
            .iter()
            .find_map(|option| validate(data, option, mode, path).ok())
            .ok_or_else(|| mismatch(path)),
        ResponseType::Enum(spec) => spec
            .lookup(data)
            .map(|member| Decoded::Enum {
                name: spec.name().to_string(),
                value: member.clone(),
            })
            .ok_or_else(|| Mismatch::new(path, format!("{} is not a member of {}", data, spec.name()))),
        ResponseType::Model(spec) => validate_model(data, spec, path),
    }
}

fn validate_model(
    data: &Value,
    spec: &Arc<ModelSpec>,
    path: &mut Path,
) -> std::result::Result<Decoded, Mismatch> {
    let object = data
        .as_object()
        .ok_or_else(|| Mismatch::new(path, format!("expected {}, found {}", spec.name(), kind_of(data))))?;
    let mut fields = IndexMap::new();
    let mut fields_set = Vec::new();
    for field in spec.fields() {
        let value = match lookup_field(object, field.wire_name(), field.name()) {
            Some(value) => value,
            None if field.is_required() => {
                return Err(Mismatch::new(path, format!("field `{}` required", field.wire_name())));
            }
            None => {
                fields.insert(field.name().to_string(), Decoded::Null);
                continue;
            }
        };
        let decoded = if value.is_null() {
            if !field.is_nullable() {
                return Err(Mismatch::new(path, format!("field `{}` may not be null", field.wire_name())));
            }
            Decoded::Null
        } else {
            let mode = if field.is_strict() { Mode::Strict } else { Mode::Lax };
            path.with(format!(".{}", field.wire_name()), |p| validate(value, field.shape(), mode, p))?
        };
        fields.insert(field.name().to_string(), decoded);
        fields_set.push(field.name().to_string());
    }
    Ok(Decoded::Model(ModelInstance::new(
        Arc::clone(spec),
        fields,
        fields_set,
        extra_members(object, spec),
        true,
    )))
}

fn lookup_field<'a>(object: &'a Map<String, Value>, wire_name: &str, name: &str) -> Option<&'a Value> {
    object.get(wire_name).or_else(|| object.get(name))
}

fn extra_members(object: &Map<String, Value>, spec: &ModelSpec) -> IndexMap<String, Document> {
    if !spec.allows_extra() {
        return IndexMap::new();
    }
    object
        .iter()
        .filter(|(key, _)| !spec.declares(key))
        .map(|(key, value)| (key.clone(), Document::from(value)))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar coercion
// ─────────────────────────────────────────────────────────────────────────────

fn to_int(data: &Value, mode: Mode) -> Option<i64> {
    match data {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (mode == Mode::Lax && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
        }),
        Value::String(s) if mode == Mode::Lax => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_float(data: &Value, mode: Mode) -> Option<f64> {
    match data {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if mode == Mode::Lax => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_bool(data: &Value, mode: Mode) -> Option<bool> {
    match (data, mode) {
        (Value::Bool(b), _) => Some(*b),
        (Value::Number(n), Mode::Lax) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        (Value::String(s), Mode::Lax) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" | "t" => Some(true),
            "false" | "0" | "no" | "n" | "off" | "f" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_date(data: &Value) -> Option<NaiveDate> {
    let s = data.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn to_datetime(data: &Value, mode: Mode) -> Option<DateTime<FixedOffset>> {
    match data {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s).ok().or_else(|| {
                // naive timestamps are taken as UTC
                ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                    .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
            })
        }
        Value::Number(n) if mode == Mode::Lax => {
            let seconds = n.as_i64()?;
            Utc.timestamp_opt(seconds, 0).single().map(|dt| dt.fixed_offset())
        }
        _ => None,
    }
}

// ============================================================================
// Step 2: relaxed construction
// ============================================================================

fn construct(data: &Value, shape: &ResponseType, path: &mut Path) -> std::result::Result<Decoded, Mismatch> {
    match shape {
        ResponseType::Model(spec) => construct_model(data, spec, path),
        ResponseType::List(item) => {
            let items = data.as_array().ok_or_else(|| Mismatch::expected(path, shape, data))?;
            items
                .iter()
                .enumerate()
                .map(|(i, value)| path.with(format!("[{}]", i), |p| validate_or_construct(value, item, p)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Decoded::List)
        }
        ResponseType::Map(value_shape) => {
            let map = data.as_object().ok_or_else(|| Mismatch::expected(path, shape, data))?;
            map.iter()
                .map(|(k, v)| {
                    path.with(format!(".{}", k), |p| validate_or_construct(v, value_shape, p))
                        .map(|decoded| (k.clone(), decoded))
                })
                .collect::<std::result::Result<IndexMap<_, _>, _>>()
                .map(Decoded::Map)
        }
        ResponseType::Union(options) => options
            .iter()
            .find_map(|option| validate_or_construct(data, option, path).ok())
            .ok_or_else(|| Mismatch::expected(path, shape, data)),
        _ => validate(data, shape, Mode::Lax, path),
    }
}

fn validate_or_construct(data: &Value, shape: &ResponseType, path: &mut Path) -> std::result::Result<Decoded, Mismatch> {
    validate(data, shape, Mode::Lax, path).or_else(|_| construct(data, shape, path))
}

/// Build a model from the fields that are present, without rejecting any.
///
/// Fails only if no declared field is present at all.
fn construct_model(
    data: &Value,
    spec: &Arc<ModelSpec>,
    path: &mut Path,
) -> std::result::Result<Decoded, Mismatch> {
    let object = data
        .as_object()
        .ok_or_else(|| Mismatch::new(path, format!("expected {}, found {}", spec.name(), kind_of(data))))?;
    let mut fields = IndexMap::new();
    let mut fields_set = Vec::new();
    for field in spec.fields() {
        let decoded = match lookup_field(object, field.wire_name(), field.name()) {
            Some(value) => {
                fields_set.push(field.name().to_string());
                if value.is_null() {
                    Decoded::Null
                } else {
                    path.with(format!(".{}", field.wire_name()), |p| {
                        validate_or_construct(value, field.shape(), p)
                    })
                    .unwrap_or_else(|_| Decoded::Raw(value.clone()))
                }
            }
            None => Decoded::Null,
        };
        fields.insert(field.name().to_string(), decoded);
    }
    if fields_set.is_empty() {
        return Err(Mismatch::new(
            path,
            format!("no field of {} is present", spec.name()),
        ));
    }
    Ok(Decoded::Model(ModelInstance::new(
        Arc::clone(spec),
        fields,
        fields_set,
        extra_members(object, spec),
        false,
    )))
}

// ============================================================================
// Step 3: generic document
// ============================================================================

fn to_document(data: &Value, path: &Path) -> std::result::Result<Decoded, Mismatch> {
    Document::from_json_bounded(data, MAX_DOCUMENT_DEPTH)
        .map(Decoded::Document)
        .ok_or_else(|| Mismatch::new(path, format!("nested deeper than {} levels", MAX_DOCUMENT_DEPTH)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::FieldSpec;
    use crate::test_support::capture_warnings;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn response(status: u16, content_type: &str, body: &[u8]) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            method: Method::GET,
            url: "https://api.waylay.io/pets/v1/pets".to_string(),
            content: Bytes::copy_from_slice(body),
        }
    }

    fn json_response(status: u16, body: Value) -> RawResponse {
        response(status, "application/json", body.to_string().as_bytes())
    }

    fn pet_spec() -> ModelSpec {
        ModelSpec::new("Pet")
            .field(FieldSpec::required("name", ResponseType::Str))
            .field(FieldSpec::required("age", ResponseType::Int))
            .field(FieldSpec::optional("owner_id", ResponseType::Str).alias("ownerId"))
    }

    #[test]
    fn test_dict_for_exact_status() {
        let mapping = TypeMapping::new().with("201", ResponseType::map(ResponseType::Str));
        let decoded = deserialize_response(
            &json_response(201, json!({"message": "not found", "code": "X"})),
            &mapping,
            None,
        )
        .unwrap();
        let map = decoded.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["message"], Decoded::Str("not found".into()));
        assert_eq!(map["code"], Decoded::Str("X".into()));
    }

    #[test]
    fn test_bytes_are_returned_unparsed() {
        let body = b"\x00\x01binary{";
        let mapping = TypeMapping::new().with("2XX", ResponseType::Bytes);
        let decoded = deserialize_response(&response(202, "application/octet-stream", body), &mapping, None).unwrap();
        assert_eq!(decoded.as_bytes().map(|b| b.as_ref()), Some(&body[..]));
    }

    #[test]
    fn test_missing_required_field_degrades_to_partial_model() {
        let mapping = TypeMapping::new().with("200", ResponseType::model(pet_spec()));
        let (decoded, warnings) = capture_warnings(|| {
            deserialize_response(&json_response(200, json!({"name": "rex"})), &mapping, None)
        });
        let model = decoded.unwrap();
        let model = model.as_model().unwrap();
        assert!(!model.is_validated());
        assert_eq!(model.get("name"), Some(&Decoded::Str("rex".into())));
        assert_eq!(model.get("age"), Some(&Decoded::Null));
        assert_eq!(model.fields_set(), ["name".to_string()]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("non-validating"));
    }

    #[test]
    fn test_error_status_decodes_body_into_api_error() {
        let error_spec = ModelSpec::new("ErrorBody").field(FieldSpec::required("error", ResponseType::Str));
        let mapping = TypeMapping::new()
            .with("200", ResponseType::model(pet_spec()))
            .with("4XX", ResponseType::model(error_spec));
        let err = deserialize_response(&json_response(404, json!({"error": "no such pet"})), &mapping, None)
            .unwrap_err();
        assert!(err.is_not_found());
        let api = err.as_api_error().unwrap();
        assert_eq!(api.reason.as_deref(), Some("Not Found"));
        let data = api.data.as_ref().and_then(Decoded::as_model).unwrap();
        assert_eq!(data.name(), "ErrorBody");
        assert_eq!(data.get("error"), Some(&Decoded::Str("no such pet".into())));
    }

    #[test]
    fn test_error_status_without_mapping_uses_document() {
        let err = deserialize_response(
            &json_response(500, json!({"message": "boom"})),
            &TypeMapping::from(ResponseType::Int),
            None,
        )
        .unwrap_err();
        let data = err.as_api_error().and_then(|e| e.data.as_ref()).unwrap();
        assert_eq!(
            data.as_document().and_then(|d| d.get("message")).and_then(Document::as_str),
            Some("boom")
        );
    }

    #[test]
    fn test_error_body_decode_failure_keeps_raw_content() {
        let color = EnumSpec::new("Color", ["red", "green"]);
        let mapping = TypeMapping::new().with("4XX", ResponseType::enumeration(color));
        let (result, warnings) = capture_warnings(|| {
            deserialize_response(&json_response(400, json!("purple")), &mapping, None)
        });
        let api = result.unwrap_err();
        let api = api.as_api_error().unwrap();
        assert!(api.data.is_none());
        assert_eq!(api.content.as_ref(), br#""purple""#);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_enum_rejects_unknown_member() {
        let shape = ResponseType::enumeration(EnumSpec::new("Color", ["red", "green"]));
        assert_eq!(
            convert(&json!("red"), &shape).unwrap(),
            Decoded::Enum { name: "Color".into(), value: json!("red") }
        );
        let err = convert(&json!("purple"), &shape).unwrap_err();
        assert!(matches!(err, Error::InvalidEnumValue { ref enum_name, .. } if enum_name == "Color"));
    }

    #[test]
    fn test_lax_scalar_coercion() {
        assert_eq!(convert(&json!("42"), &ResponseType::Int).unwrap(), Decoded::Int(42));
        assert_eq!(convert(&json!(3.0), &ResponseType::Int).unwrap(), Decoded::Int(3));
        assert_eq!(convert(&json!("2.5"), &ResponseType::Float).unwrap(), Decoded::Float(2.5));
        assert_eq!(convert(&json!("yes"), &ResponseType::Bool).unwrap(), Decoded::Bool(true));
        assert_eq!(
            convert(&json!("2024-02-29"), &ResponseType::Date).unwrap(),
            Decoded::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        let naive = convert(&json!("2024-02-29T10:00:00"), &ResponseType::DateTime).unwrap();
        let aware = convert(&json!("2024-02-29T10:00:00Z"), &ResponseType::DateTime).unwrap();
        assert_eq!(naive, aware);
    }

    #[test]
    fn test_lossy_coercion_falls_back_to_document() {
        let (decoded, warnings) = capture_warnings(|| convert(&json!(2.5), &ResponseType::Int));
        assert_eq!(decoded.unwrap(), Decoded::from_json(&json!(2.5)));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_strict_field_refuses_coercion() {
        let spec = ModelSpec::new("Counter").field(FieldSpec::required("count", ResponseType::Int).strict());
        let shape = ResponseType::model(spec);
        let strict = convert(&json!({"count": 3}), &shape).unwrap();
        assert!(strict.as_model().unwrap().is_validated());

        let (relaxed, _) = capture_warnings(|| convert(&json!({"count": "3"}), &shape));
        let relaxed = relaxed.unwrap();
        let model = relaxed.as_model().unwrap();
        assert!(!model.is_validated());
        // relaxed construction retries the field laxly
        assert_eq!(model.get("count"), Some(&Decoded::Int(3)));
    }

    #[test]
    fn test_alias_and_name_population() {
        let shape = ResponseType::model(pet_spec());
        for payload in [
            json!({"name": "rex", "age": 2, "ownerId": "o1"}),
            json!({"name": "rex", "age": 2, "owner_id": "o1"}),
        ] {
            let decoded = convert(&payload, &shape).unwrap();
            let model = decoded.as_model().unwrap();
            assert!(model.is_validated());
            assert_eq!(model.get("owner_id"), Some(&Decoded::Str("o1".into())));
        }
    }

    #[test]
    fn test_extra_members() {
        let strict = ResponseType::model(pet_spec());
        let open = ResponseType::model(pet_spec().allow_extra(true));
        let payload = json!({"name": "rex", "age": 2, "color": "brown"});

        let ignored = convert(&payload, &strict).unwrap();
        assert!(ignored.as_model().unwrap().extra().is_empty());

        let kept = convert(&payload, &open).unwrap();
        let kept = kept.as_model().unwrap();
        assert_eq!(kept.extra().get("color"), Some(&Document::String("brown".into())));
        assert_eq!(
            serde_json::to_value(kept).unwrap(),
            json!({"name": "rex", "age": 2, "color": "brown"})
        );
    }

    #[test]
    fn test_nested_models_in_relaxed_construction() {
        let owner = ModelSpec::new("Owner")
            .field(FieldSpec::required("id", ResponseType::Str))
            .field(FieldSpec::required("email", ResponseType::Str));
        let spec = pet_spec().field(FieldSpec::optional("owner", ResponseType::model(owner)));
        let shape = ResponseType::model(spec);

        // age is of the wrong type and owner misses email
        let payload = json!({"name": "rex", "age": "old", "owner": {"id": "o1"}});
        let (decoded, _) = capture_warnings(|| convert(&payload, &shape));
        let decoded = decoded.unwrap();
        let pet = decoded.as_model().unwrap();
        assert_eq!(pet.get("age"), Some(&Decoded::Raw(json!("old"))));
        let owner = pet.get("owner").and_then(Decoded::as_model).unwrap();
        assert_eq!(owner.name(), "Owner");
        assert!(!owner.is_validated());
        assert_eq!(owner.get("email"), Some(&Decoded::Null));
    }

    #[test]
    fn test_relaxed_needs_a_declared_field() {
        let shape = ResponseType::model(pet_spec());
        let (decoded, warnings) = capture_warnings(|| convert(&json!({"unrelated": 1}), &shape));
        assert_eq!(decoded.unwrap(), Decoded::from_json(&json!({"unrelated": 1})));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_unions_take_first_valid_alternative() {
        let shape = ResponseType::Union(vec![ResponseType::Int, ResponseType::Str]);
        assert_eq!(convert(&json!(7), &shape).unwrap(), Decoded::Int(7));
        assert_eq!(convert(&json!("7"), &shape).unwrap(), Decoded::Int(7));
        assert_eq!(convert(&json!("seven"), &shape).unwrap(), Decoded::Str("seven".into()));
    }

    #[test]
    fn test_list_of_models() {
        let shape = ResponseType::list(ResponseType::model(pet_spec()));
        let decoded = convert(&json!([{"name": "a", "age": 1}, {"name": "b", "age": 2}]), &shape).unwrap();
        let items = decoded.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.as_model().is_some()));
    }

    #[test]
    fn test_any_returns_data_unconverted() {
        let payload = json!({"a": [1, 2]});
        assert_eq!(convert(&payload, &ResponseType::Any).unwrap(), Decoded::Raw(payload));
    }

    #[test]
    fn test_excessive_nesting_falls_back_to_raw() {
        let mut payload = json!(1);
        for _ in 0..(MAX_DOCUMENT_DEPTH + 1) {
            payload = json!([payload]);
        }
        let (decoded, warnings) = capture_warnings(|| convert(&payload, &ResponseType::Document));
        assert_eq!(decoded.unwrap(), Decoded::Raw(payload));
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_select_path_before_conversion() {
        let body = json!({"data": {"pets": [{"name": "a", "age": 1}, {"name": "b", "age": 2}]}});
        let selector = Selector::parse("data.pets[*].name").unwrap();
        let mapping = TypeMapping::from(ResponseType::list(ResponseType::Str));
        let decoded = deserialize_response(&json_response(200, body), &mapping, Some(&selector)).unwrap();
        assert_eq!(
            decoded,
            Decoded::List(vec![Decoded::Str("a".into()), Decoded::Str("b".into())])
        );
    }

    #[test]
    fn test_text_body_is_used_when_not_json() {
        let decoded = deserialize_response(
            &response(200, "text/plain", b"hello world"),
            &TypeMapping::from(ResponseType::Str),
            None,
        )
        .unwrap();
        assert_eq!(decoded, Decoded::Str("hello world".into()));
    }
}
