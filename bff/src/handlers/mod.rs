pub(crate) mod auth;
pub(crate) mod booking;
pub(crate) mod catalog;

use axum::body::Bytes;
use serde_json::Map;
use serde_json::Value;
use staybook_protocol::ErrorKind;
use staybook_protocol::NormalizedError;

use crate::error::ProxyError;

const MAX_BOOKING_CODE_LEN: usize = 64;

pub(crate) async fn healthz() -> &'static str {
    "ok"
}

pub(crate) async fn not_found() -> ProxyError {
    ProxyError::new("fallback", NormalizedError::new(ErrorKind::NotFound))
}

/// Hotel ids are positive integers.
pub(crate) fn hotel_id(raw: &str) -> Result<u64, NormalizedError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| NormalizedError::invalid_request("Invalid hotel id."))
}

/// 1 to 64 characters of `[A-Za-z0-9_-]`.
pub(crate) fn booking_code(raw: &str) -> Result<&str, NormalizedError> {
    let valid = !raw.is_empty()
        && raw.len() <= MAX_BOOKING_CODE_LEN
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if valid {
        Ok(raw)
    } else {
        Err(NormalizedError::invalid_request("Invalid booking code."))
    }
}

/// Parse a request body that must be a JSON object.
pub(crate) fn json_object(body: &Bytes) -> Result<Map<String, Value>, NormalizedError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(NormalizedError::invalid_request(
            "The request body must be a JSON object.",
        )),
    }
}

pub(crate) fn served(endpoint: &'static str, resource: &str) {
    tracing::info!(endpoint, resource, "served");
}
