//! Helpers for the upstream response envelope.
//!
//! The upstream API answers with a JSON object carrying a `status` sentinel,
//! an optional human `message` and, on validation failures, an `errors`
//! object keyed by field name.

use std::collections::BTreeMap;

use serde_json::Value;

/// Key used for validation messages that are not attached to a field.
pub const GENERAL_FIELD: &str = "_";

/// Whether the body's `status` field is one of the success sentinels:
/// `1`, `"1"`, `true` or `"success"`.
pub fn is_success(body: &Value) -> bool {
    match body.get("status") {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => {
            let s = s.trim();
            s == "1" || s.eq_ignore_ascii_case("success")
        }
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Human-readable message from `message`, falling back to a string `error`.
pub fn message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}

/// Field validation messages from `errors` (or `field_errors`).
///
/// Accepts `{field: "msg"}`, `{field: ["msg", ...]}` and a bare array of
/// strings, which is filed under [`GENERAL_FIELD`].
pub fn field_errors(body: &Value) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    let Some(errors) = body.get("errors").or_else(|| body.get("field_errors")) else {
        return out;
    };
    match errors {
        Value::Object(map) => {
            for (field, messages) in map {
                let messages = strings(messages);
                if !messages.is_empty() {
                    out.insert(field.clone(), messages);
                }
            }
        }
        Value::Array(_) => {
            let messages = strings(errors);
            if !messages.is_empty() {
                out.insert(GENERAL_FIELD.to_string(), messages);
            }
        }
        _ => {}
    }
    out
}

/// Join field errors into one display string, one message per line.
/// Returns `None` when there is nothing to show.
pub fn flatten_field_errors(errors: &BTreeMap<String, Vec<String>>) -> Option<String> {
    let joined = errors
        .values()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    (!joined.is_empty()).then_some(joined)
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
