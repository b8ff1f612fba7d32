//! Request cache with in-flight deduplication and stale-while-revalidate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use staybook_login::CacheInvalidator;
use staybook_protocol::NormalizedError;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use crate::config::CacheConfig;
use crate::key::CacheKey;
use crate::key::Scope;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, NormalizedError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Fresh,
    /// Served as-is while a refetch may be running.
    Stale,
    /// No value yet; a fetch is in flight.
    Fetching,
    Error,
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot<T> {
    pub state: EntryState,
    pub data: Option<T>,
    pub error: Option<NormalizedError>,
    pub fetched_at: Option<Instant>,
}

struct Entry<T> {
    data: Option<(T, Instant)>,
    error: Option<(NormalizedError, Instant)>,
    in_flight: Option<(u64, SharedFetch<T>)>,
}

impl<T> Entry<T> {
    /// Nothing worth keeping: no fetch running, no value inside retention
    /// and no error inside the negative TTL.
    fn expired(&self, now: Instant, config: &CacheConfig) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let keep_data = self
            .data
            .as_ref()
            .is_some_and(|(_, at)| now.duration_since(*at) < config.fresh_ttl + config.retention);
        let keep_error = self
            .error
            .as_ref()
            .is_some_and(|(_, at)| now.duration_since(*at) < config.negative_ttl);
        !keep_data && !keep_error
    }
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            in_flight: None,
        }
    }
}

struct Inner<T> {
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, Entry<T>>>,
    next_fetch: AtomicU64,
    last_sweep: Mutex<Instant>,
}

enum Plan<T> {
    Ready(Result<T, NormalizedError>),
    Wait(SharedFetch<T>),
}

/// Cache of `T` values keyed by [`CacheKey`].
///
/// At most one fetch per key is in flight; concurrent callers share it and
/// all observe the same value or error. Fetches run on a spawned task, so a
/// caller that goes away does not cancel them.
pub struct ResourceCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                entries: Mutex::new(HashMap::new()),
                next_fetch: AtomicU64::new(0),
                last_sweep: Mutex::new(Instant::now()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Cached value for `key`, fetching with `fetch` when needed.
    ///
    /// Fresh values return immediately. Stale values also return
    /// immediately and start a background refetch. Without a value the
    /// caller waits for the (possibly shared) fetch. A recent error is
    /// returned again until the negative TTL passes.
    pub async fn get<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, NormalizedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        let plan = self.plan(key, fetch);
        match plan {
            Plan::Ready(result) => result,
            Plan::Wait(shared) => shared.await,
        }
    }

    /// Fetch again regardless of freshness or a cached error. Joins a fetch
    /// that is already in flight.
    pub async fn refresh<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, NormalizedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        let shared = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_default();
            match &entry.in_flight {
                Some((_, shared)) => shared.clone(),
                None => self.start_fetch(entry, key, fetch()),
            }
        };
        shared.await
    }

    fn plan<F, Fut>(&self, key: CacheKey, fetch: F) -> Plan<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        let now = Instant::now();
        let config = &self.inner.config;
        let sweep = self.sweep_due(now);
        let mut entries = self.lock();
        if sweep {
            sweep_expired(&mut entries, now, config);
        }
        let entry = entries.entry(key.clone()).or_default();

        let recent_error = entry
            .error
            .as_ref()
            .filter(|(_, at)| now.duration_since(*at) < config.negative_ttl)
            .map(|(err, _)| err.clone());

        if let Some((data, fetched_at)) = &entry.data {
            let data = data.clone();
            if now.duration_since(*fetched_at) < config.fresh_ttl {
                trace!(%key, "cache hit");
                return Plan::Ready(Ok(data));
            }
            if entry.in_flight.is_none() && recent_error.is_none() {
                debug!(%key, "serving stale entry; revalidating");
                self.start_fetch(entry, key, fetch());
            }
            return Plan::Ready(Ok(data));
        }

        if let Some((_, shared)) = &entry.in_flight {
            trace!(%key, "joining in-flight fetch");
            return Plan::Wait(shared.clone());
        }
        if let Some(err) = recent_error {
            trace!(%key, "serving cached error");
            return Plan::Ready(Err(err));
        }
        Plan::Wait(self.start_fetch(entry, key, fetch()))
    }

    fn start_fetch<Fut>(&self, entry: &mut Entry<T>, key: CacheKey, fetch: Fut) -> SharedFetch<T>
    where
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        let id = self.inner.next_fetch.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task = async move {
            let result = fetch.await;
            inner.complete(&key, id, &result);
            result
        }
        .boxed()
        .shared();
        entry.in_flight = Some((id, task.clone()));
        tokio::spawn(task.clone());
        task
    }

    /// Drop every entry in `scope`. Fetches still in flight for those
    /// entries will not repopulate them.
    pub fn invalidate(&self, scope: Scope) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| key.scope() != scope);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(?scope, removed, "cache invalidated");
        }
        removed
    }

    /// Drop entries with nothing worth keeping. Also runs from `get` at
    /// most once per `fresh_ttl`.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        sweep_expired(&mut self.lock(), now, &self.inner.config)
    }

    fn sweep_due(&self, now: Instant) -> bool {
        let mut last = self
            .inner
            .last_sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if now.duration_since(*last) < self.inner.config.fresh_ttl {
            return false;
        }
        *last = now;
        true
    }

    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn peek(&self, key: &CacheKey) -> Option<EntrySnapshot<T>> {
        let now = Instant::now();
        let entries = self.lock();
        let entry = entries.get(key)?;
        let state = match (&entry.data, &entry.in_flight, &entry.error) {
            (Some((_, at)), _, _) if now.duration_since(*at) < self.inner.config.fresh_ttl => {
                EntryState::Fresh
            }
            (Some(_), _, _) => EntryState::Stale,
            (None, Some(_), _) => EntryState::Fetching,
            (None, None, Some(_)) => EntryState::Error,
            (None, None, None) => return None,
        };
        Some(EntrySnapshot {
            state,
            data: entry.data.as_ref().map(|(data, _)| data.clone()),
            error: entry.error.as_ref().map(|(err, _)| err.clone()),
            fetched_at: entry.data.as_ref().map(|(_, at)| *at),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry<T>>> {
        self.inner.lock()
    }
}

fn sweep_expired<T>(
    entries: &mut HashMap<CacheKey, Entry<T>>,
    now: Instant,
    config: &CacheConfig,
) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.expired(now, config));
    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, "expired cache entries evicted");
    }
    evicted
}

impl<T> Inner<T>
where
    T: Clone,
{
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &CacheKey, id: u64, result: &Result<T, NormalizedError>) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            trace!(%key, "fetch finished after invalidation; dropping result");
            return;
        };
        if !matches!(&entry.in_flight, Some((current, _)) if *current == id) {
            trace!(%key, "fetch superseded; dropping result");
            return;
        }
        entry.in_flight = None;
        let now = Instant::now();
        match result {
            Ok(data) => {
                entry.data = Some((data.clone(), now));
                entry.error = None;
            }
            Err(err) => {
                debug!(%key, kind = %err.kind, "fetch failed; caching error");
                entry.error = Some((err.clone(), now));
            }
        }
    }
}

impl<T> CacheInvalidator for ResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn invalidate_user_scope(&self) {
        self.invalidate(Scope::User);
    }
}

impl<T> std::fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
