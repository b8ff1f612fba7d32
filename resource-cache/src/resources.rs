//! Storefront resources bound to their cache keys, the BFF client and the
//! current session.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use staybook_backend_client::BffClient;
use staybook_login::SessionStore;
use staybook_protocol::ErrorKind;
use staybook_protocol::Hotel;
use staybook_protocol::Location;
use staybook_protocol::NormalizedError;
use staybook_protocol::Room;
use tracing::info;

use crate::cache::ResourceCache;
use crate::config::CacheConfig;
use crate::key::CacheKey;
use crate::search::DebouncedSearch;
use crate::search::SearchFn;

pub struct StorefrontResources {
    client: BffClient,
    session: Arc<SessionStore>,
    config: CacheConfig,
    rooms: ResourceCache<Vec<Room>>,
    hotels: ResourceCache<Hotel>,
    locations: ResourceCache<Vec<Location>>,
    bookings: ResourceCache<Value>,
}

impl StorefrontResources {
    /// Builds the caches and registers the user-scoped ones with `session`
    /// so login and logout clear them.
    pub fn new(client: BffClient, session: Arc<SessionStore>, config: CacheConfig) -> Self {
        let bookings = ResourceCache::new(config.clone());
        session.add_invalidator(Arc::new(bookings.clone()));
        Self {
            client,
            session,
            rooms: ResourceCache::new(config.clone()),
            hotels: ResourceCache::new(config.clone()),
            locations: ResourceCache::new(config.clone()),
            bookings,
            config,
        }
    }

    pub async fn availability(&self, hotel_id: u64) -> Result<Vec<Room>, NormalizedError> {
        let client = self.client.clone();
        self.rooms
            .get(availability_key(hotel_id), move || async move {
                client.availability(hotel_id).await
            })
            .await
    }

    /// Explicit retry; skips the cached error.
    pub async fn refresh_availability(&self, hotel_id: u64) -> Result<Vec<Room>, NormalizedError> {
        let client = self.client.clone();
        self.rooms
            .refresh(availability_key(hotel_id), move || async move {
                client.availability(hotel_id).await
            })
            .await
    }

    pub async fn hotel(&self, hotel_id: u64) -> Result<Hotel, NormalizedError> {
        let client = self.client.clone();
        let id = hotel_id.to_string();
        self.hotels
            .get(CacheKey::public("hotel", [("id", id.as_str())]), move || async move {
                client.hotel(hotel_id).await
            })
            .await
    }

    /// Queries shorter than the configured minimum answer `[]` without a
    /// network call.
    pub async fn search_locations(&self, query: &str) -> Result<Vec<Location>, NormalizedError> {
        let query = query.trim();
        if query.chars().count() < self.config.min_query_len {
            return Ok(Vec::new());
        }
        fetch_locations(&self.locations, &self.client, query.to_string()).await
    }

    /// Debounced location search backed by the same cache as
    /// [`Self::search_locations`].
    pub fn location_search(&self) -> DebouncedSearch<Location> {
        let cache = self.locations.clone();
        let client = self.client.clone();
        let search: SearchFn<Location> = Arc::new(move |query: String| {
            let cache = cache.clone();
            let client = client.clone();
            async move { fetch_locations(&cache, &client, query).await }.boxed()
        });
        DebouncedSearch::new(&self.config, search)
    }

    /// A booking of the signed-in user. Fails with `Unauthenticated`
    /// without a network call when nobody is signed in.
    pub async fn booking(&self, booking_code: &str) -> Result<Value, NormalizedError> {
        let token = self
            .session
            .token()
            .ok_or_else(NormalizedError::unauthenticated)?;
        let client = self.client.clone();
        let code = booking_code.to_string();
        self.bookings
            .get(
                CacheKey::user("booking", [("code", booking_code)]),
                move || async move { client.booking(&token, &code).await },
            )
            .await
            .inspect_err(|err| self.note_rejection(err))
    }

    /// Place an order. Never cached or retried; success drops user-scoped
    /// entries so bookings are refetched.
    pub async fn checkout(&self, order: &Value) -> Result<Value, NormalizedError> {
        let token = self
            .session
            .token()
            .ok_or_else(NormalizedError::unauthenticated)?;
        let confirmation = self
            .client
            .checkout(&token, order)
            .await
            .inspect_err(|err| self.note_rejection(err))?;
        info!("checkout completed");
        self.session.invalidate_user_scope();
        Ok(confirmation)
    }

    /// A 401 for a user-scoped call marks the session expired without
    /// logging out.
    fn note_rejection(&self, err: &NormalizedError) {
        if err.kind == ErrorKind::Unauthenticated {
            self.session.session_expired();
        }
    }

    pub fn rooms_cache(&self) -> &ResourceCache<Vec<Room>> {
        &self.rooms
    }

    pub fn bookings_cache(&self) -> &ResourceCache<Value> {
        &self.bookings
    }
}

fn availability_key(hotel_id: u64) -> CacheKey {
    let id = hotel_id.to_string();
    CacheKey::public("availability", [("hotel_id", id.as_str())])
}

async fn fetch_locations(
    cache: &ResourceCache<Vec<Location>>,
    client: &BffClient,
    query: String,
) -> Result<Vec<Location>, NormalizedError> {
    let key = CacheKey::public("locations", [("q", query.as_str())]);
    let client = client.clone();
    cache
        .get(key, move || async move {
            client.search_locations(&query).await
        })
        .await
}
