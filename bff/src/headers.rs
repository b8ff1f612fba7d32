//! `Cache-Control` policies.

use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::header::CACHE_CONTROL;
use axum::response::AppendHeaders;

/// Anything derived from a bearer-scoped response, an auth call or an error.
pub fn no_store() -> HeaderValue {
    HeaderValue::from_static("no-store")
}

/// Read-only catalog resources.
pub fn public_cache(max_age: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={max_age}")).unwrap_or_else(|_| no_store())
}

pub fn cache_control(value: HeaderValue) -> AppendHeaders<[(HeaderName, HeaderValue); 1]> {
    AppendHeaders([(CACHE_CONTROL, value)])
}
