//! Validation and normalization of freshly decoded documents.
//!
//! A decoder hands over a loosely typed YAML value. Before the engine trusts
//! it, the value is rebuilt as a pure JSON data tree: tagged values and
//! composite mapping keys are rejected, scalar keys are stringified, and
//! non-finite floats collapse to `null`. The version fields are then checked.

use crate::document::{type_name, ApiDocument};
use crate::error::SanitizeError;
use serde_json::{Map, Number, Value};
use serde_yaml::Value as RawValue;
use tracing::debug;

/// Version fields, checked in this order.
const VERSION_FIELDS: [&str; 2] = ["swagger", "openapi"];

/// Validate and normalize a decoded document.
pub fn sanitize(raw: &RawValue) -> Result<ApiDocument, SanitizeError> {
    let value = to_data(raw, "")?;

    let root = match value {
        Value::Object(root) => root,
        other => {
            return Err(SanitizeError::InvalidDocument {
                actual: type_name(&other),
            })
        }
    };

    for field in VERSION_FIELDS {
        if let Some(v) = root.get(field) {
            if !v.is_string() {
                return Err(SanitizeError::InvalidVersionType {
                    field,
                    actual: type_name(v),
                });
            }
        }
    }

    let has_version = VERSION_FIELDS.iter().any(|field| {
        root.get(*field)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.is_empty())
    });
    if !has_version {
        return Err(SanitizeError::MissingVersion);
    }

    let document = ApiDocument::from_root(root);
    debug!(
        version = document.version().unwrap_or_default(),
        paths = document.path_count(),
        "Document sanitized"
    );
    Ok(document)
}

/// Rebuild a raw value as plain JSON data.
fn to_data(raw: &RawValue, location: &str) -> Result<Value, SanitizeError> {
    Ok(match raw {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Number(n) => number_to_data(n),
        RawValue::String(s) => Value::String(s.clone()),
        RawValue::Sequence(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_data(item, &child(location, &i.to_string())))
                .collect::<Result<_, _>>()?,
        ),
        RawValue::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, item) in mapping {
                let key = key_to_string(key, location)?;
                let item = to_data(item, &child(location, &key))?;
                map.insert(key, item);
            }
            Value::Object(map)
        }
        RawValue::Tagged(_) => {
            return Err(SanitizeError::NonDataValue {
                location: display_location(location),
                reason: "tagged YAML value",
            })
        }
    })
}

fn number_to_data(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Mapping keys become strings; only scalars have a string form.
fn key_to_string(key: &RawValue, location: &str) -> Result<String, SanitizeError> {
    match key {
        RawValue::String(s) => Ok(s.clone()),
        RawValue::Number(n) => Ok(n.to_string()),
        RawValue::Bool(b) => Ok(b.to_string()),
        RawValue::Null => Ok("null".to_string()),
        RawValue::Sequence(_) | RawValue::Mapping(_) | RawValue::Tagged(_) => {
            Err(SanitizeError::NonDataValue {
                location: display_location(location),
                reason: "mapping key is not a scalar",
            })
        }
    }
}

/// Append a JSON pointer segment.
fn child(location: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        location,
        segment.replace('~', "~0").replace('/', "~1")
    )
}

fn display_location(location: &str) -> String {
    if location.is_empty() {
        "/".to_string()
    } else {
        location.to_string()
    }
}
