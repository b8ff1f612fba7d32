//! Login, registration and token revocation.
//!
//! Login and registration use the service credential and, unlike the
//! catalog endpoints, pass a 4xx upstream JSON body through so the form can
//! show the upstream's own validation messages.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;
use serde_json::json;
use staybook_protocol::ErrorKind;
use staybook_protocol::LoginRequest;
use staybook_protocol::NormalizedError;
use staybook_protocol::Registration;

use super::json_object;
use super::served;
use crate::AppState;
use crate::error::ProxyError;
use crate::headers;
use crate::upstream::ForwardedBearer;
use crate::upstream::ProxyRequest;
use crate::upstream::UpstreamAuth;
use crate::upstream::UpstreamResponse;

pub(crate) async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "login";
    let fields = json_object(&body).map_err(ProxyError::at(ENDPOINT))?;
    let mut request: LoginRequest = serde_json::from_value(Value::Object(fields))
        .ok()
        .filter(|r: &LoginRequest| !r.email.trim().is_empty() && !r.password.is_empty())
        .ok_or_else(|| {
            ProxyError::new(
                ENDPOINT,
                NormalizedError::invalid_request("Email and password are required."),
            )
        })?;
    if request.device_name.as_deref().is_none_or(|d| d.trim().is_empty()) {
        request.device_name = Some(state.config.device_name.clone());
    }

    let body = serde_json::to_value(&request)
        .map_err(|err| ProxyError::new(ENDPOINT, NormalizedError::malformed(err)))?;
    let result = state
        .upstream
        .send(ProxyRequest::post("login", UpstreamAuth::Service).json(body))
        .await;
    relay(ENDPOINT, "Login failed", result)
}

pub(crate) async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "register";
    let fields = json_object(&body).map_err(ProxyError::at(ENDPOINT))?;
    let registration: Registration =
        serde_json::from_value(Value::Object(fields)).map_err(|_| {
            ProxyError::new(
                ENDPOINT,
                NormalizedError::invalid_request("Name, email and password are required."),
            )
        })?;

    let body = serde_json::to_value(&registration)
        .map_err(|err| ProxyError::new(ENDPOINT, NormalizedError::malformed(err)))?;
    let result = state
        .upstream
        .send(ProxyRequest::post("register", UpstreamAuth::Service).json(body))
        .await;
    relay(ENDPOINT, "Registration failed", result)
}

/// Revoke the caller's token upstream.
pub(crate) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "logout";
    let bearer = ForwardedBearer::from_headers(&headers).map_err(ProxyError::at(ENDPOINT))?;
    let body = state
        .upstream
        .send(ProxyRequest::post("logout", UpstreamAuth::Bearer(bearer)))
        .await
        .and_then(UpstreamResponse::into_success)
        .map_err(ProxyError::at(ENDPOINT))?;

    served(ENDPOINT, "token");
    let status = body.get("status").cloned().unwrap_or_else(|| json!(1));
    Ok((
        headers::cache_control(headers::no_store()),
        Json(json!({ "status": status })),
    )
        .into_response())
}

/// Success bodies go back verbatim; 4xx JSON bodies are passed through;
/// everything else becomes `{error: fallback}` with the upstream status, or
/// 500 when there was no usable response.
fn relay(
    endpoint: &'static str,
    fallback: &'static str,
    result: Result<UpstreamResponse, NormalizedError>,
) -> Result<Response, ProxyError> {
    let response = match result {
        Ok(response) => response,
        Err(error) => {
            return Err(ProxyError::new(
                endpoint,
                error.with_message(fallback).with_status(500),
            ));
        }
    };
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    match response.body {
        Some(body) if status.is_success() => {
            served(endpoint, "session");
            Ok((headers::cache_control(headers::no_store()), Json(body)).into_response())
        }
        Some(body) if status.is_client_error() => Err(ProxyError::Passthrough {
            endpoint,
            status,
            body,
        }),
        body => {
            let (kind, http_status) = if status.is_success() {
                (ErrorKind::Unknown, 500)
            } else {
                (ErrorKind::from_status(status.as_u16()), status.as_u16())
            };
            let cause = match body {
                Some(body) => format!("upstream {status}: {body}"),
                None => format!("upstream {status} without a JSON body"),
            };
            Err(ProxyError::new(
                endpoint,
                NormalizedError::new(kind)
                    .with_message(fallback)
                    .with_status(http_status)
                    .with_cause(cause),
            ))
        }
    }
}
