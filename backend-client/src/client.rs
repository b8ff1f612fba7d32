use std::time::Duration;

use reqwest::Method;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use staybook_protocol::AuthToken;
use staybook_protocol::DataEnvelope;
use staybook_protocol::Hotel;
use staybook_protocol::Location;
use staybook_protocol::LoginRequest;
use staybook_protocol::LoginSuccess;
use staybook_protocol::NormalizedError;
use staybook_protocol::Registration;
use staybook_protocol::RegistrationSuccess;
use staybook_protocol::Room;
use url::Url;

/// Request timeout used by [`BffClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid BFF base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct BffClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BffClient {
    pub fn new(base_url: &str) -> Result<Self, ClientBuildError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, Url::parse(base_url)?))
    }

    /// Use a preconfigured `reqwest::Client` (shared pool, custom timeouts).
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginSuccess, NormalizedError> {
        let body = self
            .send(self.request(Method::POST, "auth/login")?.json(request), "login")
            .await?;
        LoginSuccess::from_body(&body)
    }

    pub async fn register(
        &self,
        registration: &Registration,
    ) -> Result<RegistrationSuccess, NormalizedError> {
        let body = self
            .send(
                self.request(Method::POST, "auth/register")?.json(registration),
                "register",
            )
            .await?;
        RegistrationSuccess::from_body(&body)
    }

    /// Revoke `token` server-side.
    pub async fn revoke(&self, token: &AuthToken) -> Result<(), NormalizedError> {
        self.send(
            self.request(Method::POST, "auth/logout")?
                .bearer_auth(token.expose()),
            "logout",
        )
        .await
        .map(drop)
    }

    pub async fn availability(&self, hotel_id: u64) -> Result<Vec<Room>, NormalizedError> {
        let path = format!("hotel/availability/{hotel_id}");
        let body = self
            .send(self.request(Method::GET, &path)?, "availability")
            .await?;
        decode::<DataEnvelope<Vec<Room>>>(body, "availability").map(|env| env.data)
    }

    pub async fn hotel(&self, hotel_id: u64) -> Result<Hotel, NormalizedError> {
        let path = format!("hotel/{hotel_id}");
        let body = self.send(self.request(Method::GET, &path)?, "hotel").await?;
        decode::<DataEnvelope<Hotel>>(body, "hotel").map(|env| env.data)
    }

    pub async fn search_locations(&self, query: &str) -> Result<Vec<Location>, NormalizedError> {
        let body = self
            .send(
                self.request(Method::GET, "locations/search")?
                    .query(&[("q", query)]),
                "location search",
            )
            .await?;
        decode::<DataEnvelope<Vec<Location>>>(body, "location search").map(|env| env.data)
    }

    pub async fn booking(
        &self,
        token: &AuthToken,
        booking_code: &str,
    ) -> Result<Value, NormalizedError> {
        let path = format!("hotel/booking/{}", urlencoding::encode(booking_code));
        let body = self
            .send(
                self.request(Method::GET, &path)?.bearer_auth(token.expose()),
                "booking",
            )
            .await?;
        decode::<DataEnvelope<Value>>(body, "booking").map(|env| env.data)
    }

    pub async fn checkout(
        &self,
        token: &AuthToken,
        order: &Value,
    ) -> Result<Value, NormalizedError> {
        let body = self
            .send(
                self.request(Method::POST, "checkout")?
                    .bearer_auth(token.expose())
                    .json(order),
                "checkout",
            )
            .await?;
        decode::<DataEnvelope<Value>>(body, "checkout").map(|env| env.data)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, NormalizedError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| NormalizedError::malformed(format!("bad BFF path {path}: {err}")))?;
        Ok(self.http.request(method, url))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value, NormalizedError> {
        let response = request.send().await.map_err(|err| transport_error(what, &err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(what, &err))?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();

        if !status.is_success() {
            let error = NormalizedError::from_response(status.as_u16(), body.as_ref());
            tracing::debug!(
                call = what,
                status = status.as_u16(),
                kind = %error.kind,
                "BFF call failed"
            );
            return Err(error);
        }

        body.ok_or_else(|| {
            NormalizedError::malformed(format!("{what}: response body was not JSON"))
        })
    }
}

fn transport_error(what: &str, err: &reqwest::Error) -> NormalizedError {
    tracing::debug!(call = what, error = %err, "BFF unreachable");
    if err.is_builder() || err.is_decode() {
        NormalizedError::malformed(format!("{what}: {err}"))
    } else {
        NormalizedError::unreachable(format!("{what}: {err}"))
    }
}

fn decode<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, NormalizedError> {
    serde_json::from_value(body).map_err(|err| NormalizedError::malformed(format!("{what}: {err}")))
}
