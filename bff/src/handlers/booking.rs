//! User-scoped endpoints. The caller's bearer token is required and
//! forwarded as received; responses are never cacheable.

use axum::Json;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;
use staybook_protocol::DataEnvelope;
use staybook_protocol::NormalizedError;
use staybook_protocol::envelope;

use super::booking_code;
use super::json_object;
use super::served;
use crate::AppState;
use crate::error::ProxyError;
use crate::headers;
use crate::sanitize;
use crate::upstream::ForwardedBearer;
use crate::upstream::ProxyRequest;
use crate::upstream::UpstreamAuth;
use crate::upstream::UpstreamResponse;

pub(crate) async fn booking(
    State(state): State<AppState>,
    Path(raw_code): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "booking";
    let bearer = ForwardedBearer::from_headers(&headers).map_err(ProxyError::at(ENDPOINT))?;
    let code = booking_code(&raw_code).map_err(ProxyError::at(ENDPOINT))?;

    let body = state
        .upstream
        .send(
            ProxyRequest::get("bookings/{code}", UpstreamAuth::Bearer(bearer))
                .path_param("code", code),
        )
        .await
        .and_then(UpstreamResponse::into_success)
        .map_err(ProxyError::at(ENDPOINT))?;
    rejected_unless_success(ENDPOINT, &body, "We couldn't load that booking.")?;

    let data = body.get("data").ok_or_else(|| {
        ProxyError::new(
            ENDPOINT,
            NormalizedError::upstream_empty("Booking not found")
                .with_cause(format!("booking {code}: no data in upstream response")),
        )
    })?;

    served(ENDPOINT, code);
    Ok(private(sanitize::record(data)))
}

pub(crate) async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "checkout";
    let bearer = ForwardedBearer::from_headers(&headers).map_err(ProxyError::at(ENDPOINT))?;
    let order = json_object(&body).map_err(ProxyError::at(ENDPOINT))?;

    let body = state
        .upstream
        .send(
            ProxyRequest::post("checkout", UpstreamAuth::Bearer(bearer))
                .json(Value::Object(order)),
        )
        .await
        .and_then(UpstreamResponse::into_success)
        .map_err(ProxyError::at(ENDPOINT))?;
    rejected_unless_success(ENDPOINT, &body, "We couldn't complete your booking.")?;

    served(ENDPOINT, "order");
    let data = body.get("data").map(sanitize::record).unwrap_or(Value::Null);
    Ok(private(data))
}

/// Upstream answered 2xx with a non-success `status`: 400 with its message
/// and field errors.
fn rejected_unless_success(
    endpoint: &'static str,
    body: &Value,
    fallback: &str,
) -> Result<(), ProxyError> {
    if envelope::is_success(body) {
        return Ok(());
    }
    let message = envelope::message(body).unwrap_or_else(|| fallback.to_string());
    Err(ProxyError::new(
        endpoint,
        NormalizedError::upstream_rejected(message)
            .with_field_errors(envelope::field_errors(body))
            .with_cause(format!("upstream status {}", body.get("status").unwrap_or(&Value::Null))),
    ))
}

fn private(data: Value) -> Response {
    (
        headers::cache_control(headers::no_store()),
        Json(DataEnvelope { data }),
    )
        .into_response()
}
