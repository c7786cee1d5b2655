//! Decoded values.
//!
//! [`Decoded`] is what the deserializer hands back: one variant per target
//! shape, plus the generic [`Document`] tree and the unconverted json value
//! used as fallbacks.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

use crate::error::Result;
use crate::shape::ModelSpec;

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

/// A loosely-typed document: a tree of primitives, lists and ordered objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Document>),
    Object(IndexMap<String, Document>),
}

impl Document {
    /// Build a document, refusing trees nested deeper than `max_depth`.
    pub fn from_json_bounded(value: &Value, max_depth: usize) -> Option<Self> {
        Some(match value {
            Value::Null => Document::Null,
            Value::Bool(b) => Document::Bool(*b),
            Value::Number(n) => Document::Number(n.clone()),
            Value::String(s) => Document::String(s.clone()),
            Value::Array(items) => {
                let depth = max_depth.checked_sub(1)?;
                Document::List(
                    items
                        .iter()
                        .map(|item| Document::from_json_bounded(item, depth))
                        .collect::<Option<_>>()?,
                )
            }
            Value::Object(map) => {
                let depth = max_depth.checked_sub(1)?;
                Document::Object(
                    map.iter()
                        .map(|(k, v)| Some((k.clone(), Document::from_json_bounded(v, depth)?)))
                        .collect::<Option<_>>()?,
                )
            }
        })
    }

    /// Member of an object document.
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Element of a list document.
    pub fn at(&self, index: usize) -> Option<&Document> {
        match self {
            Document::List(items) => items.get(index),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Document::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Document::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    /// Convert back into a json value.
    pub fn to_value(&self) -> Value {
        match self {
            Document::Null => Value::Null,
            Document::Bool(b) => Value::Bool(*b),
            Document::Number(n) => Value::Number(n.clone()),
            Document::String(s) => Value::String(s.clone()),
            Document::List(items) => Value::Array(items.iter().map(Document::to_value).collect()),
            Document::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for Document {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Document::Null,
            Value::Bool(b) => Document::Bool(*b),
            Value::Number(n) => Document::Number(n.clone()),
            Value::String(s) => Document::String(s.clone()),
            Value::Array(items) => Document::List(items.iter().map(Document::from).collect()),
            Value::Object(map) => Document::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Document::from(v)))
                    .collect(),
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Model instances
// ─────────────────────────────────────────────────────────────────────────────

/// An instance of a declared model.
///
/// Every declared field has a value; fields that were absent from the
/// payload hold [`Decoded::Null`] and are not part of [`fields_set`].
/// Serialization uses the wire names and leaves out null fields unless they
/// were explicitly set.
///
/// [`fields_set`]: ModelInstance::fields_set
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    spec: Arc<ModelSpec>,
    fields: IndexMap<String, Decoded>,
    fields_set: Vec<String>,
    extra: IndexMap<String, Document>,
    validated: bool,
}

impl ModelInstance {
    pub(crate) fn new(
        spec: Arc<ModelSpec>,
        fields: IndexMap<String, Decoded>,
        fields_set: Vec<String>,
        extra: IndexMap<String, Document>,
        validated: bool,
    ) -> Self {
        Self {
            spec,
            fields,
            fields_set,
            extra,
            validated,
        }
    }

    /// Name of the model.
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// The model declaration.
    pub fn spec(&self) -> &Arc<ModelSpec> {
        &self.spec
    }

    /// Value of a declared field, by field name.
    pub fn get(&self, field: &str) -> Option<&Decoded> {
        self.fields.get(field)
    }

    /// Declared field values, in declaration order.
    pub fn fields(&self) -> &IndexMap<String, Decoded> {
        &self.fields
    }

    /// Names of the fields present in the payload.
    pub fn fields_set(&self) -> &[String] {
        &self.fields_set
    }

    /// Whether a field was present in the payload.
    pub fn is_set(&self, field: &str) -> bool {
        self.fields_set.iter().any(|f| f == field)
    }

    /// Undeclared members kept from the payload.
    pub fn extra(&self) -> &IndexMap<String, Document> {
        &self.extra
    }

    /// False if the instance was built by the relaxed, non-validating step.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    fn wire_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.spec
            .field_spec(field)
            .map(|spec| spec.wire_name())
            .unwrap_or(field)
    }

    fn serialized_fields(&self) -> impl Iterator<Item = (&str, &Decoded)> {
        self.fields
            .iter()
            .filter(|(name, value)| !value.is_null() || self.is_set(name))
            .map(|(name, value)| (self.wire_name(name), value))
    }
}

impl Serialize for ModelInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in self.serialized_fields() {
            map.serialize_entry(key, value)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoded
// ─────────────────────────────────────────────────────────────────────────────

/// A response payload converted into its target shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Bytes),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    List(Vec<Decoded>),
    Map(IndexMap<String, Decoded>),
    /// A member of a declared enumeration.
    Enum { name: String, value: Value },
    Model(ModelInstance),
    Document(Document),
    /// The parsed payload, unconverted.
    Raw(Value),
}

impl Decoded {
    /// Wrap a json value as a generic document.
    pub fn from_json(value: &Value) -> Self {
        Decoded::Document(Document::from(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Decoded::Null | Decoded::Document(Document::Null) | Decoded::Raw(Value::Null)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Decoded::Str(s) => Some(s),
            Decoded::Document(doc) => doc.as_str(),
            Decoded::Raw(value) => value.as_str(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Decoded::Int(i) => Some(*i),
            Decoded::Document(doc) => doc.as_i64(),
            Decoded::Raw(value) => value.as_i64(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Decoded::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelInstance> {
        match self {
            Decoded::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Decoded::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Decoded]> {
        match self {
            Decoded::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Decoded>> {
        match self {
            Decoded::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Render as a json value.
    ///
    /// Bytes render as (lossy) text, dates in ISO 8601.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Land the value in a plain Rust type.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

impl Serialize for Decoded {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Decoded::Null => serializer.serialize_none(),
            Decoded::Bool(b) => serializer.serialize_bool(*b),
            Decoded::Int(i) => serializer.serialize_i64(*i),
            Decoded::Float(f) => serializer.serialize_f64(*f),
            Decoded::Str(s) => serializer.serialize_str(s),
            Decoded::Bytes(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            Decoded::Date(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
            Decoded::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Decoded::List(items) => serializer.collect_seq(items),
            Decoded::Map(map) => serializer.collect_map(map),
            Decoded::Enum { value, .. } => value.serialize(serializer),
            Decoded::Model(model) => model.serialize(serializer),
            Decoded::Document(doc) => doc.serialize(serializer),
            Decoded::Raw(value) => value.serialize(serializer),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tri-state request fields
// ─────────────────────────────────────────────────────────────────────────────

/// A request model field that distinguishes "never set" from "set to null".
///
/// Use with `#[serde(default, skip_serializing_if = "Field::is_unset")]` so
/// that untouched fields are omitted while explicit nulls are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Unset,
    Null,
    Set(T),
}

impl<T> Field<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Field::Set(value),
            None => Field::Null,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Set(value) => value.serialize(serializer),
            Field::Unset | Field::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Field::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{FieldSpec, ResponseType};
    use serde_json::json;

    #[test]
    fn test_document_keeps_member_order() {
        let value: Value = serde_json::from_str(r#"{"b": 1, "a": [true, null, "x"]}"#).unwrap();
        let doc = Document::from(&value);
        match &doc {
            Document::Object(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(doc.get("a").and_then(|a| a.at(2)).and_then(Document::as_str), Some("x"));
        assert_eq!(doc.to_value(), value);
    }

    #[test]
    fn test_document_depth_bound() {
        let nested = json!({"a": {"b": {"c": 1}}});
        assert!(Document::from_json_bounded(&nested, 3).is_some());
        assert!(Document::from_json_bounded(&nested, 2).is_none());
        assert!(Document::from_json_bounded(&json!("leaf"), 0).is_some());
    }

    #[test]
    fn test_model_serialization_honours_fields_set() {
        let spec = Arc::new(
            ModelSpec::new("Pet")
                .field(FieldSpec::required("name", ResponseType::Str))
                .field(FieldSpec::optional("tag", ResponseType::Str))
                .field(FieldSpec::optional("owner_id", ResponseType::Str).alias("ownerId")),
        );
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), Decoded::Str("rex".into()));
        fields.insert("tag".to_string(), Decoded::Null);
        fields.insert("owner_id".to_string(), Decoded::Null);
        let model = ModelInstance::new(
            spec,
            fields,
            vec!["name".to_string(), "owner_id".to_string()],
            IndexMap::new(),
            true,
        );
        // tag was never set: omitted; ownerId was set to null: kept
        assert_eq!(
            serde_json::to_value(&model).unwrap(),
            json!({"name": "rex", "ownerId": null})
        );
    }

    #[test]
    fn test_decoded_into_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Pet {
            name: String,
            age: u32,
        }
        let decoded = Decoded::from_json(&json!({"name": "rex", "age": 3}));
        let pet: Pet = decoded.into_typed().unwrap();
        assert_eq!(pet, Pet { name: "rex".into(), age: 3 });

        assert!(Decoded::Str("x".into()).into_typed::<Pet>().is_err());
    }

    #[test]
    fn test_decoded_to_value_for_scalars() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Decoded::Date(date).to_value(), json!("2024-02-29"));
        assert_eq!(Decoded::Bytes(Bytes::from_static(b"abc")).to_value(), json!("abc"));
        assert_eq!(
            Decoded::Enum { name: "Color".into(), value: json!("red") }.to_value(),
            json!("red")
        );
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct PetPatch {
        #[serde(default, skip_serializing_if = "Field::is_unset")]
        name: Field<String>,
        #[serde(default, skip_serializing_if = "Field::is_unset")]
        tag: Field<String>,
        #[serde(default, skip_serializing_if = "Field::is_unset")]
        owner: Field<String>,
    }

    #[test]
    fn test_field_tri_state_serialization() {
        let patch = PetPatch {
            name: Field::Set("rex".into()),
            tag: Field::Null,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"name": "rex", "tag": null})
        );
    }

    #[test]
    fn test_field_tri_state_deserialization() {
        let patch: PetPatch = serde_json::from_value(json!({"tag": null, "owner": "bob"})).unwrap();
        assert!(patch.name.is_unset());
        assert!(patch.tag.is_null());
        assert_eq!(patch.owner.as_option().map(String::as_str), Some("bob"));
    }
}
