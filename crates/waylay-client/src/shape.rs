//! Declared target shapes and the status code mapping.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Shape used when nothing more specific is declared.
pub static DEFAULT_RESPONSE_TYPE: ResponseType = ResponseType::Document;

/// The shape a payload is converted into.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseType {
    Str,
    Int,
    Float,
    Bool,
    Date,
    DateTime,
    /// The raw response body, unparsed.
    Bytes,
    /// The parsed payload, unconverted.
    Any,
    /// A generic, loosely-typed document.
    #[default]
    Document,
    List(Box<ResponseType>),
    /// A mapping with string keys.
    Map(Box<ResponseType>),
    /// The first alternative that validates.
    Union(Vec<ResponseType>),
    Enum(Arc<EnumSpec>),
    Model(Arc<ModelSpec>),
}

impl ResponseType {
    pub fn list(item: ResponseType) -> Self {
        ResponseType::List(Box::new(item))
    }

    pub fn map(value: ResponseType) -> Self {
        ResponseType::Map(Box::new(value))
    }

    pub fn model(spec: ModelSpec) -> Self {
        ResponseType::Model(Arc::new(spec))
    }

    pub fn enumeration(spec: EnumSpec) -> Self {
        ResponseType::Enum(Arc::new(spec))
    }

    /// Whether the raw body is returned unparsed.
    pub fn is_bytes(&self) -> bool {
        matches!(self, ResponseType::Bytes)
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseType::Str => f.write_str("str"),
            ResponseType::Int => f.write_str("int"),
            ResponseType::Float => f.write_str("float"),
            ResponseType::Bool => f.write_str("bool"),
            ResponseType::Date => f.write_str("date"),
            ResponseType::DateTime => f.write_str("datetime"),
            ResponseType::Bytes => f.write_str("bytes"),
            ResponseType::Any => f.write_str("Any"),
            ResponseType::Document => f.write_str("Document"),
            ResponseType::List(item) => write!(f, "List[{}]", item),
            ResponseType::Map(value) => write!(f, "Dict[str, {}]", value),
            ResponseType::Union(options) => {
                f.write_str("Union[")?;
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", option)?;
                }
                f.write_str("]")
            }
            ResponseType::Enum(spec) => f.write_str(&spec.name),
            ResponseType::Model(spec) => f.write_str(&spec.name),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// A closed set of accepted values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSpec {
    name: String,
    values: Vec<Value>,
}

impl EnumSpec {
    pub fn new<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member equal to `value`.
    pub fn lookup(&self, value: &Value) -> Option<&Value> {
        self.values.iter().find(|member| *member == value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Models
// ─────────────────────────────────────────────────────────────────────────────

/// A declared model: named fields with their shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    name: String,
    fields: Vec<FieldSpec>,
    allow_extra: bool,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            allow_extra: false,
        }
    }

    /// Declare a field.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Keep undeclared members instead of ignoring them.
    pub fn allow_extra(mut self, allow: bool) -> Self {
        self.allow_extra = allow;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn allows_extra(&self) -> bool {
        self.allow_extra
    }

    /// Field declaration by field name.
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `key` names a declared field, by wire name or by field name.
    pub(crate) fn declares(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.name == key || f.alias.as_deref() == Some(key))
    }
}

/// Declaration of one model field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    alias: Option<String>,
    shape: ResponseType,
    required: bool,
    nullable: bool,
    strict: bool,
}

impl FieldSpec {
    /// A field that must be present and not null.
    pub fn required(name: impl Into<String>, shape: ResponseType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            shape,
            required: true,
            nullable: false,
            strict: false,
        }
    }

    /// A field that may be absent or null.
    pub fn optional(name: impl Into<String>, shape: ResponseType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            shape,
            required: false,
            nullable: true,
            strict: false,
        }
    }

    /// Name of the member on the wire.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Disable lax scalar coercion for this field.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn shape(&self) -> &ResponseType {
        &self.shape
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status code mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Response shapes per status code pattern.
///
/// Keys are exact codes (`"200"`), class wildcards (`"4XX"`), `"default"`
/// or `"*"`. Resolution goes exact, class, `default`, `*`, then
/// [`DEFAULT_RESPONSE_TYPE`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeMapping {
    entries: Vec<(String, Option<ResponseType>)>,
}

impl TypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a status key to a shape. Keys are case-insensitive.
    pub fn with(mut self, key: &str, shape: ResponseType) -> Self {
        self.insert(key, Some(shape));
        self
    }

    /// Declare a status key without a shape; it is skipped during resolution.
    pub fn without_type(mut self, key: &str) -> Self {
        self.insert(key, None);
        self
    }

    fn insert(&mut self, key: &str, shape: Option<ResponseType>) {
        let key = normalize_key(key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = shape,
            None => self.entries.push((key, shape)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, key: &str) -> Option<&ResponseType> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, shape)| shape.as_ref())
    }

    /// The shape for a status code.
    pub fn resolve(&self, status: u16) -> &ResponseType {
        let exact = status.to_string();
        let class = format!("{}XX", status / 100);
        [exact.as_str(), class.as_str(), "DEFAULT", "*"]
            .into_iter()
            .find_map(|key| self.get(key))
            .unwrap_or(&DEFAULT_RESPONSE_TYPE)
    }
}

impl From<ResponseType> for TypeMapping {
    /// A single shape applies to all 2XX responses.
    fn from(shape: ResponseType) -> Self {
        TypeMapping::new().with("2XX", shape)
    }
}

impl<'a> FromIterator<(&'a str, ResponseType)> for TypeMapping {
    fn from_iter<I: IntoIterator<Item = (&'a str, ResponseType)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(TypeMapping::new(), |mapping, (key, shape)| mapping.with(key, shape))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}
