//! Public catalog reads. All use the service credential and are cacheable
//! by the browser for the configured max-age.

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;
use staybook_protocol::DataEnvelope;
use staybook_protocol::NormalizedError;
use staybook_protocol::envelope;

use super::hotel_id;
use super::served;
use crate::AppState;
use crate::error::ProxyError;
use crate::headers;
use crate::sanitize;
use crate::upstream::ProxyRequest;
use crate::upstream::UpstreamAuth;
use crate::upstream::UpstreamResponse;

const MIN_QUERY_CHARS: usize = 2;
const MAX_QUERY_CHARS: usize = 100;

pub(crate) async fn availability(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "availability";
    let id = hotel_id(&raw_id).map_err(ProxyError::at(ENDPOINT))?;
    let body = state
        .upstream
        .send(
            ProxyRequest::get("hotels/{id}/availability", UpstreamAuth::Service)
                .path_param("id", id.to_string()),
        )
        .await
        .and_then(UpstreamResponse::into_success)
        .map_err(ProxyError::at(ENDPOINT))?;

    let no_rooms = || {
        ProxyError::new(
            ENDPOINT,
            NormalizedError::upstream_empty("No rooms found")
                .with_status(404)
                .with_cause(format!("hotel {id}: no rooms in upstream response")),
        )
    };
    if !envelope::is_success(&body) {
        return Err(no_rooms());
    }
    let rooms = list(&body, "rooms")
        .filter(|rooms| !rooms.is_empty())
        .ok_or_else(no_rooms)?;

    let rooms = rooms.iter().map(sanitize::room).collect::<Vec<_>>();
    served(ENDPOINT, &id.to_string());
    Ok(public(&state, DataEnvelope { data: rooms }))
}

pub(crate) async fn hotel(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "hotel";
    let id = hotel_id(&raw_id).map_err(ProxyError::at(ENDPOINT))?;
    let body = state
        .upstream
        .send(
            ProxyRequest::get("hotels/{id}", UpstreamAuth::Service)
                .path_param("id", id.to_string()),
        )
        .await
        .and_then(UpstreamResponse::into_success)
        .map_err(ProxyError::at(ENDPOINT))?;

    let hotel = body
        .get("data")
        .filter(|data| data.is_object() && envelope::is_success(&body))
        .ok_or_else(|| {
            ProxyError::new(
                ENDPOINT,
                NormalizedError::upstream_empty("Hotel not found")
                    .with_status(404)
                    .with_cause(format!("hotel {id}: no data in upstream response")),
            )
        })?;

    served(ENDPOINT, &id.to_string());
    Ok(public(&state, DataEnvelope { data: sanitize::hotel(hotel) }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    q: Option<String>,
}

pub(crate) async fn search_locations(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ProxyError> {
    const ENDPOINT: &str = "location search";
    let query = params.q.as_deref().unwrap_or_default().trim();
    let chars = query.chars().count();
    if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&chars) {
        return Err(ProxyError::new(
            ENDPOINT,
            NormalizedError::invalid_request(format!(
                "Search must be between {MIN_QUERY_CHARS} and {MAX_QUERY_CHARS} characters."
            )),
        ));
    }

    let body = state
        .upstream
        .send(ProxyRequest::get("locations", UpstreamAuth::Service).query("q", query))
        .await
        .and_then(UpstreamResponse::into_success)
        .map_err(ProxyError::at(ENDPOINT))?;
    if !envelope::is_success(&body) {
        let message = envelope::message(&body)
            .unwrap_or_else(|| "The search could not be completed.".to_string());
        return Err(ProxyError::new(
            ENDPOINT,
            NormalizedError::upstream_rejected(message),
        ));
    }

    let locations = list(&body, "locations")
        .map(|items| items.iter().map(sanitize::location).collect::<Vec<_>>())
        .unwrap_or_default();
    served(ENDPOINT, query);
    Ok(public(&state, DataEnvelope { data: locations }))
}

/// A collection under `data.<key>`, `<key>` or `data` itself.
fn list<'a>(body: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    body.get("data")
        .and_then(|data| data.get(key))
        .or_else(|| body.get(key))
        .or_else(|| body.get("data"))
        .and_then(Value::as_array)
}

fn public<T: serde::Serialize>(state: &AppState, body: T) -> Response {
    (
        headers::cache_control(headers::public_cache(state.config.public_max_age)),
        Json(body),
    )
        .into_response()
}
