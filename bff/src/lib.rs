//! `staybook-bff`: the backend-for-frontend in front of the upstream
//! booking API.
//!
//! The only place the privileged service credential exists. Each endpoint
//! validates its input, makes one upstream call with either the service
//! credential or the caller's forwarded bearer token, sanitizes what comes
//! back and answers with a stable JSON shape and an explicit
//! `Cache-Control` policy.

pub mod config;
pub mod error;
mod handlers;
pub mod headers;
pub mod sanitize;
pub mod upstream;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use tower_http::trace::TraceLayer;

pub use config::BffConfig;
pub use config::ConfigError;
pub use config::ConfigLoader;
pub use config::ServiceCredential;
pub use error::ProxyError;
pub use upstream::UpstreamClient;

/// Shared, read-only state for every request.
#[derive(Clone, Debug)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub config: Arc<BffConfig>,
}

impl AppState {
    pub fn new(config: BffConfig) -> Result<Self, upstream::UpstreamBuildError> {
        let upstream = UpstreamClient::new(&config)?;
        Ok(Self {
            upstream: Arc::new(upstream),
            config: Arc::new(config),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/hotel/availability/{id}", get(handlers::catalog::availability))
        .route("/hotel/booking/{code}", get(handlers::booking::booking))
        .route("/hotel/{id}", get(handlers::catalog::hotel))
        .route("/locations/search", get(handlers::catalog::search_locations))
        .route("/checkout", post(handlers::booking::checkout))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
