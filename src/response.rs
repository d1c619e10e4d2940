//! Response synthesis from documented examples.

use crate::document::{is_truthy, Operation};
use serde_json::{Map, Value};

/// Media type whose examples are served.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Pick the response definition used for the body.
///
/// `"200"` is preferred; otherwise the first entry in document order.
pub fn select_response<'a>(operation: &Operation<'a>) -> Option<(&'a str, &'a Value)> {
    let responses = operation.responses()?;
    match responses.get("200").filter(|v| is_truthy(v)) {
        Some(ok) => Some(("200", ok)),
        None => responses.iter().next().map(|(k, v)| (k.as_str(), v)),
    }
}

/// Build the mock body for an operation.
///
/// Never fails: anything missing along the way yields an empty object.
pub fn synthesize(operation: &Operation<'_>) -> Value {
    select_response(operation)
        .and_then(|(_, response)| example_for(response))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// `example` first, then `examples.default.value`. Falsy values (`null`,
/// `false`, `0`, `""`) are skipped.
fn example_for(response: &Value) -> Option<&Value> {
    let media = response
        .get("content")
        .and_then(|content| content.get(JSON_MEDIA_TYPE))
        .filter(|media| is_truthy(media))?;

    media
        .get("example")
        .filter(|v| is_truthy(v))
        .or_else(|| {
            media
                .get("examples")
                .and_then(|examples| examples.get("default"))
                .and_then(|default| default.get("value"))
                .filter(|v| is_truthy(v))
        })
}
