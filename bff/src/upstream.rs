//! The single HTTP client the proxy uses to reach the upstream API.
//!
//! One attempt per call, bounded by the configured timeout. Transport
//! failures come back as [`NormalizedError`]; HTTP error statuses come back
//! as an [`UpstreamResponse`] so endpoints can apply their own policy.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::InvalidHeaderValue;
use serde_json::Value;
use staybook_protocol::AuthToken;
use staybook_protocol::NormalizedError;
use url::Url;

use crate::config::BffConfig;
use crate::config::ServiceCredential;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamBuildError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service credential cannot be sent as a header")]
    Credential(#[from] InvalidHeaderValue),
}

/// A caller's `Authorization: Bearer ...` header, forwarded as received.
#[derive(Clone)]
pub struct ForwardedBearer {
    header: HeaderValue,
}

impl ForwardedBearer {
    /// Accepts only `Bearer <non-empty token without whitespace>`.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, NormalizedError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(NormalizedError::unauthenticated)?;
        let valid = header
            .to_str()
            .ok()
            .and_then(AuthToken::from_bearer_header)
            .is_some();
        if !valid {
            return Err(NormalizedError::unauthenticated());
        }
        let mut header = header.clone();
        header.set_sensitive(true);
        Ok(Self { header })
    }
}

impl fmt::Debug for ForwardedBearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ForwardedBearer(<redacted>)")
    }
}

/// Which credential an upstream call carries.
#[derive(Debug, Clone)]
pub enum UpstreamAuth {
    /// The privileged service credential.
    Service,
    Bearer(ForwardedBearer),
    Anonymous,
}

impl UpstreamAuth {
    fn label(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Bearer(_) => "bearer",
            Self::Anonymous => "anonymous",
        }
    }
}

/// One upstream call, described before it is sent.
///
/// `path` is a template relative to the upstream base URL; `{name}`
/// placeholders are filled from `path_params`, percent-encoded.
#[derive(Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: &'static str,
    pub path_params: Vec<(&'static str, String)>,
    pub query_params: Vec<(&'static str, String)>,
    pub body: Option<Value>,
    pub auth: UpstreamAuth,
}

impl ProxyRequest {
    pub fn new(method: Method, path: &'static str, auth: UpstreamAuth) -> Self {
        Self {
            method,
            path,
            path_params: Vec::new(),
            query_params: Vec::new(),
            body: None,
            auth,
        }
    }

    pub fn get(path: &'static str, auth: UpstreamAuth) -> Self {
        Self::new(Method::GET, path, auth)
    }

    pub fn post(path: &'static str, auth: UpstreamAuth) -> Self {
        Self::new(Method::POST, path, auth)
    }

    #[must_use]
    pub fn path_param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.path_params.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query_params.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The path with placeholders filled in.
    pub fn rendered_path(&self) -> String {
        let mut path = self.path.to_string();
        for (name, value) in &self.path_params {
            path = path.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
        }
        path
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("method", &self.method)
            .field("path", &self.rendered_path())
            .field(
                "query_params",
                &self.query_params.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            )
            .field("has_body", &self.body.is_some())
            .field("auth", &self.auth.label())
            .finish()
    }
}

/// What the upstream answered: the status and the body if it was JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl UpstreamResponse {
    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The JSON body of a 2xx response, or the normalized HTTP error.
    pub fn into_success(self) -> Result<Value, NormalizedError> {
        if !self.is_http_success() {
            return Err(NormalizedError::from_upstream(
                self.status,
                self.body.as_ref(),
            ));
        }
        self.body.ok_or_else(|| {
            NormalizedError::malformed(format!("upstream {} without a JSON body", self.status))
        })
    }
}

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    service_auth: HeaderValue,
}

impl UpstreamClient {
    pub fn new(config: &BffConfig) -> Result<Self, UpstreamBuildError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;
        Self::with_client(http, config.upstream_url.clone(), &config.service)
    }

    pub fn with_client(
        http: reqwest::Client,
        mut base_url: Url,
        service: &ServiceCredential,
    ) -> Result<Self, UpstreamBuildError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            service_auth: basic_auth_header(service)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send `request` once. Only a missing response is an `Err`.
    pub async fn send(&self, request: ProxyRequest) -> Result<UpstreamResponse, NormalizedError> {
        let path = request.rendered_path();
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| NormalizedError::malformed(format!("bad upstream path {path}: {err}")))?;

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query_params.is_empty() {
            builder = builder.query(&request.query_params);
        }
        builder = match &request.auth {
            UpstreamAuth::Service => builder.header(AUTHORIZATION, self.service_auth.clone()),
            UpstreamAuth::Bearer(bearer) => builder.header(AUTHORIZATION, bearer.header.clone()),
            UpstreamAuth::Anonymous => builder,
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(?request, "calling upstream");
        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(&path, &err))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(&path, &err))?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();
        Ok(UpstreamResponse { status, body })
    }
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// `Basic base64(user:password)`, marked sensitive so it never shows up in
/// header dumps.
fn basic_auth_header(service: &ServiceCredential) -> Result<HeaderValue, InvalidHeaderValue> {
    let encoded = STANDARD.encode(format!("{}:{}", service.username(), service.password()));
    let mut header = HeaderValue::from_str(&format!("Basic {encoded}"))?;
    header.set_sensitive(true);
    Ok(header)
}

fn transport_error(path: &str, err: &reqwest::Error) -> NormalizedError {
    let chain = error_chain(err);
    if err.is_builder() {
        NormalizedError::malformed(format!("{path}: {chain}"))
    } else {
        NormalizedError::unreachable(format!("{path}: {chain}"))
    }
}

/// `err` and all of its sources, joined with `": "`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(next) = source {
        out.push_str(": ");
        out.push_str(&next.to_string());
        source = next.source();
    }
    out
}
