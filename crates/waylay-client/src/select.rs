//! Path selection on parsed payloads.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use serde_json_path::JsonPath;

use crate::error::{Error, Result};

/// A compiled JSONPath selector.
///
/// Selectors without a root (`data.items`) are taken relative to the root.
/// A selector with a wildcard, recursive descent, filter, slice or union
/// yields the list of matches; any other selector yields its single match,
/// or null.
#[derive(Clone)]
pub struct Selector {
    expression: String,
    path: Arc<JsonPath>,
    multiple: bool,
}

impl Selector {
    pub fn parse(expression: &str) -> Result<Self> {
        let normalized = normalize(expression);
        let path = JsonPath::parse(&normalized).map_err(|e| Error::InvalidSelector {
            path: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expression: expression.to_string(),
            path: Arc::new(path),
            multiple: denotes_multiple(expression),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the selector yields a list of matches.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn select(&self, data: &Value) -> Value {
        let nodes = self.path.query(data);
        if self.multiple {
            Value::Array(nodes.all().into_iter().cloned().collect())
        } else {
            nodes.all().first().map(|v| (*v).clone()).unwrap_or(Value::Null)
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("expression", &self.expression)
            .field("multiple", &self.multiple)
            .finish()
    }
}

fn normalize(expression: &str) -> String {
    let expression = expression.trim();
    if expression.starts_with('$') {
        expression.to_string()
    } else if expression.starts_with('[') {
        format!("${}", expression)
    } else {
        format!("$.{}", expression)
    }
}

/// True if the selector has a wildcard, a recursive descent, a filter, or
/// a bracket slice or union.
fn denotes_multiple(expression: &str) -> bool {
    let unquoted = strip_quoted(expression);
    let dotted = unquoted.trim_start_matches('$');
    if dotted.contains("..") || dotted.starts_with('*') || dotted.contains(".*") {
        return true;
    }
    let mut rest = unquoted.as_str();
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            return false;
        };
        let segment = after[..close].trim();
        if segment == "*" || segment.starts_with('?') || segment.contains(':') || segment.contains(',') {
            return true;
        }
        rest = &after[close + 1..];
    }
    false
}

/// The expression with the contents of quoted names removed.
fn strip_quoted(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in expression.chars() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => {}
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}
