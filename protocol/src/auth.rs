//! Authentication payloads and the opaque values a session holds.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::envelope;
use crate::error::NormalizedError;

/// Opaque bearer token issued by the upstream identity API.
///
/// `Debug` is redacted; use [`AuthToken::expose`] where the raw value is
/// actually needed (storage, the `Authorization` header).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Accepts any non-empty string without whitespace.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(raw))
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    pub fn from_bearer_header(value: &str) -> Option<Self> {
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Self::new(token)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// The user object returned by the upstream on login.
///
/// The session layer treats it as opaque; the only requirement is that it
/// is a non-empty JSON object.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Some(Self(map)),
            _ => None,
        }
    }

    /// Parse the string form kept in durable storage.
    pub fn from_storage_str(raw: &str) -> Option<Self> {
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(Self::from_value)
    }

    pub fn to_storage_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for UserRecord {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| "user must be a non-empty JSON object".to_string())
    }
}

impl From<UserRecord> for Value {
    fn from(user: UserRecord) -> Self {
        Value::Object(user.0)
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("fields", &self.0.len())
            .finish()
    }
}

/// Body of `POST /auth/login`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            device_name: None,
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("device_name", &self.device_name)
            .finish()
    }
}

/// Body of `POST /auth/register`. Unknown fields are forwarded as-is.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_confirmation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A login response that carried both halves of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginSuccess {
    pub token: AuthToken,
    pub user: UserRecord,
}

impl LoginSuccess {
    /// Validate a login response body.
    ///
    /// `token` and `user` are read from the top level or from `data`.
    pub fn from_body(body: &Value) -> Result<Self, NormalizedError> {
        if !envelope::is_success(body) {
            let message = envelope::message(body).unwrap_or_else(|| "Login failed".to_string());
            return Err(NormalizedError::upstream_rejected(message));
        }
        let token = lookup(body, "token")
            .and_then(Value::as_str)
            .and_then(AuthToken::new);
        let user = lookup(body, "user")
            .cloned()
            .and_then(UserRecord::from_value);
        match (token, user) {
            (Some(token), Some(user)) => Ok(Self { token, user }),
            (None, _) => Err(NormalizedError::upstream_empty("Login failed")
                .with_status(500)
                .with_cause("login response carried no token")),
            (_, None) => Err(NormalizedError::upstream_empty("Login failed")
                .with_status(500)
                .with_cause("login response carried no user")),
        }
    }
}

/// A registration response with a success `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationSuccess {
    pub message: Option<String>,
}

impl RegistrationSuccess {
    pub fn from_body(body: &Value) -> Result<Self, NormalizedError> {
        if !envelope::is_success(body) {
            let fallback = NormalizedError::upstream_rejected(
                envelope::message(body).unwrap_or_else(|| "Registration failed".to_string()),
            );
            return Err(fallback.with_field_errors(envelope::field_errors(body)));
        }
        Ok(Self {
            message: envelope::message(body),
        })
    }
}

fn lookup<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key)
        .or_else(|| body.get("data").and_then(|data| data.get(key)))
}
