//! Sanitized API description document.
//!
//! The document is kept as a plain JSON object tree. Only the version fields
//! are checked up front; everything under `paths` is read defensively when a
//! request is matched.

use serde::Serialize;
use serde_json::{Map, Value};

/// A sanitized OpenAPI/Swagger document.
///
/// Instances are produced by [`crate::sanitizer::sanitize`] and are immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ApiDocument {
    root: Map<String, Value>,
}

impl ApiDocument {
    pub(crate) fn from_root(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Swagger 2 style version string, if present.
    pub fn swagger(&self) -> Option<&str> {
        self.root.get("swagger").and_then(Value::as_str)
    }

    /// OpenAPI 3 style version string, if present.
    pub fn openapi(&self) -> Option<&str> {
        self.root.get("openapi").and_then(Value::as_str)
    }

    /// The effective version: `swagger` wins over `openapi` when both are set.
    pub fn version(&self) -> Option<&str> {
        self.swagger()
            .filter(|v| !v.is_empty())
            .or_else(|| self.openapi().filter(|v| !v.is_empty()))
    }

    /// Iterate path templates and their path items in document order.
    ///
    /// A missing or non-mapping `paths` yields nothing.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|paths| paths.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Number of path templates in the document.
    pub fn path_count(&self) -> usize {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .map(Map::len)
            .unwrap_or(0)
    }

    /// Borrow the underlying object tree.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Consume the document into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }
}

/// One documented HTTP method on one path template.
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    value: &'a Value,
}

impl<'a> Operation<'a> {
    pub(crate) fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// The operation's `responses` table, if it is a mapping.
    pub fn responses(&self) -> Option<&'a Map<String, Value>> {
        self.value.get("responses").and_then(Value::as_object)
    }
}

/// Loose truthiness used when reading optional document fragments.
///
/// `null`, `false`, `0` and `""` count as absent; arrays and mappings are
/// always present, even when empty.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Human readable name of a JSON value's type, used in error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ApiDocument {
        match value {
            Value::Object(root) => ApiDocument::from_root(root),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_version_prefers_swagger() {
        let d = doc(json!({"swagger": "2.0", "openapi": "3.0.0"}));
        assert_eq!(d.version(), Some("2.0"));

        let d = doc(json!({"swagger": "", "openapi": "3.1.0"}));
        assert_eq!(d.version(), Some("3.1.0"));
    }

    #[test]
    fn test_paths_in_document_order() {
        let d = doc(json!({
            "openapi": "3.0.0",
            "paths": {"/b": {}, "/a": {}, "/c": {}}
        }));
        let templates: Vec<_> = d.paths().map(|(t, _)| t).collect();
        assert_eq!(templates, vec!["/b", "/a", "/c"]);
        assert_eq!(d.path_count(), 3);
    }

    #[test]
    fn test_malformed_paths_tolerated() {
        let d = doc(json!({"openapi": "3.0.0", "paths": ["/a"]}));
        assert_eq!(d.paths().count(), 0);
        assert_eq!(d.path_count(), 0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!("x")));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let d = doc(json!({"openapi": "3.0.0", "info": {"title": "Pets"}}));
        let text = serde_json::to_string(&d).unwrap();
        assert_eq!(text, r#"{"openapi":"3.0.0","info":{"title":"Pets"}}"#);
    }
}
