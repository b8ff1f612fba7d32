use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;
use staybook_protocol::NormalizedError;

use crate::headers;

/// Every way a proxy endpoint can fail. Rendering logs the failure and
/// produces a JSON body; nothing escapes a handler as a bare status.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{endpoint}: {error}")]
    Normalized {
        endpoint: &'static str,
        error: NormalizedError,
    },

    /// Auth endpoints hand a 4xx upstream JSON body back verbatim.
    #[error("{endpoint}: upstream answered {status}")]
    Passthrough {
        endpoint: &'static str,
        status: StatusCode,
        body: Value,
    },
}

impl ProxyError {
    pub fn new(endpoint: &'static str, error: NormalizedError) -> Self {
        Self::Normalized { endpoint, error }
    }

    /// A `map_err` adapter for `endpoint`.
    pub fn at(endpoint: &'static str) -> impl Fn(NormalizedError) -> Self {
        move |error| Self::new(endpoint, error)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            Self::Normalized { endpoint, error } => {
                tracing::error!(
                    endpoint,
                    kind = %error.kind,
                    status = error.http_status,
                    message = %error.message,
                    cause = error.cause.as_deref().unwrap_or(""),
                    "request failed"
                );
                let status = StatusCode::from_u16(error.http_status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (
                    status,
                    headers::cache_control(headers::no_store()),
                    Json(error.body()),
                )
                    .into_response()
            }
            Self::Passthrough {
                endpoint,
                status,
                body: _,
            } if !status.is_client_error() => {
                // Only 4xx bodies are meant for the browser.
                Self::new(
                    endpoint,
                    NormalizedError::from_upstream(status.as_u16(), None),
                )
                .into_response()
            }
            Self::Passthrough {
                endpoint,
                status,
                body,
            } => {
                tracing::error!(
                    endpoint,
                    status = status.as_u16(),
                    "upstream rejected request; passing its body through"
                );
                (
                    status,
                    headers::cache_control(headers::no_store()),
                    Json(body),
                )
                    .into_response()
            }
        }
    }
}
