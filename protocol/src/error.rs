//! Normalized error taxonomy.
//!
//! Every failure between the browser and the upstream API is reported as a
//! [`NormalizedError`]. The HTTP status and client message are chosen by
//! [`ErrorKind`]; upstream detail only survives as a server-side `cause`,
//! except for the message and field errors of an upstream 400.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::envelope;

/// Stable error classification shared by proxy and client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response from the next hop (connect failure, timeout, reset).
    Unreachable,
    InvalidRequest,
    Unauthenticated,
    Forbidden,
    NotFound,
    RateLimited,
    /// Upstream answered with a 5xx.
    UpstreamFault,
    /// Upstream reported success but the expected payload is missing.
    UpstreamEmpty,
    /// Upstream answered 2xx with a non-success `status` sentinel.
    UpstreamRejected,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::InvalidRequest => "invalid_request",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::UpstreamFault => "upstream_fault",
            Self::UpstreamEmpty => "upstream_empty",
            Self::UpstreamRejected => "upstream_rejected",
            Self::Unknown => "unknown",
        }
    }

    /// HTTP status the proxy answers with unless an endpoint pins its own.
    pub fn default_status(self) -> u16 {
        match self {
            Self::Unreachable | Self::UpstreamFault => 502,
            Self::InvalidRequest | Self::UpstreamRejected => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::NotFound | Self::UpstreamEmpty => 404,
            Self::RateLimited => 429,
            Self::Unknown => 500,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::Unreachable => {
                "We couldn't reach the server. Check your connection and try again."
            }
            Self::InvalidRequest | Self::UpstreamRejected => "The request was invalid.",
            Self::Unauthenticated => "Your session has expired. Please log in again.",
            Self::Forbidden => "You are not allowed to do that.",
            Self::NotFound | Self::UpstreamEmpty => "We couldn't find what you were looking for.",
            Self::RateLimited => "Too many attempts. Please wait a moment and try again.",
            Self::UpstreamFault => "Something went wrong on our side. Please try again later.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Classify an upstream HTTP error status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::UpstreamFault,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure in client-safe form.
///
/// `cause` is diagnostic detail for the server log; it is never part of
/// [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct NormalizedError {
    pub kind: ErrorKind,
    pub http_status: u16,
    pub message: String,
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub cause: Option<String>,
}

impl NormalizedError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            http_status: kind.default_status(),
            message: kind.default_message().to_string(),
            field_errors: BTreeMap::new(),
            cause: None,
        }
    }

    /// The next hop never answered.
    pub fn unreachable(cause: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Unreachable).with_cause(cause)
    }

    /// A response arrived but could not be understood.
    pub fn malformed(cause: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Unknown).with_cause(cause)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest).with_message(message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorKind::Unauthenticated)
    }

    pub fn upstream_empty(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamEmpty).with_message(message)
    }

    pub fn upstream_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamRejected).with_message(message)
    }

    /// Map an upstream HTTP error response.
    ///
    /// Only a 400/422 keeps the upstream message and field errors; every
    /// other status gets the generic message for its kind and the upstream
    /// body is kept as `cause`.
    pub fn from_upstream(status: u16, body: Option<&Value>) -> Self {
        let kind = ErrorKind::from_status(status);
        let mut error = Self::new(kind);
        if kind == ErrorKind::InvalidRequest
            && let Some(body) = body
        {
            if let Some(message) = envelope::message(body) {
                error.message = message;
            }
            error.field_errors = envelope::field_errors(body);
        }
        if let Some(body) = body {
            error.cause = Some(format!("upstream {status}: {body}"));
        } else {
            error.cause = Some(format!("upstream {status} with no JSON body"));
        }
        error
    }

    /// Rebuild an error from a proxy response (client side).
    ///
    /// Accepts both the proxy's own [`ErrorBody`] and an upstream body the
    /// auth endpoints pass through verbatim.
    pub fn from_response(status: u16, body: Option<&Value>) -> Self {
        let declared = body
            .and_then(|b| b.get("kind"))
            .and_then(|k| serde_json::from_value::<ErrorKind>(k.clone()).ok());
        let kind = declared.unwrap_or_else(|| ErrorKind::from_status(status));
        let mut error = Self::new(kind).with_status(status);
        if let Some(body) = body {
            if let Some(message) = envelope::message(body) {
                error.message = message;
            }
            error.field_errors = envelope::field_errors(body);
        }
        error
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    #[must_use]
    pub fn with_field_errors(mut self, field_errors: BTreeMap<String, Vec<String>>) -> Self {
        self.field_errors = field_errors;
        self
    }

    /// One string for an inline form message: field errors flattened when
    /// present, otherwise the message.
    pub fn display_message(&self) -> String {
        envelope::flatten_field_errors(&self.field_errors).unwrap_or_else(|| self.message.clone())
    }

    /// The client-facing body. Never includes `cause`.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message.clone(),
            kind: self.kind,
            field_errors: self.field_errors.clone(),
        }
    }
}

/// JSON error shape the proxy returns to the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, Vec<String>>,
}
