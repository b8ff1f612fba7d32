//! Debounced free-text search.
//!
//! Every keystroke calls [`DebouncedSearch::set_query`]. Queries below the
//! minimum length publish an empty result at once and make no call; longer
//! ones are issued after the quiet period, and only the latest one is.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use futures::future::BoxFuture;
use staybook_async_utils::Debouncer;
use staybook_protocol::NormalizedError;
use tokio::sync::watch;
use tracing::debug;

use crate::config::CacheConfig;

pub type SearchFn<T> =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<T>, NormalizedError>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchState<T> {
    /// The trimmed query these results belong to.
    pub query: String,
    pub results: Vec<T>,
    pub error: Option<NormalizedError>,
    /// A call is scheduled or running for `query`.
    pub pending: bool,
}

impl<T> Default for SearchState<T> {
    fn default() -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            error: None,
            pending: false,
        }
    }
}

pub struct DebouncedSearch<T> {
    debouncer: Debouncer,
    min_len: usize,
    latest: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState<T>>>,
    search: SearchFn<T>,
}

impl<T> DebouncedSearch<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig, search: SearchFn<T>) -> Self {
        Self {
            debouncer: Debouncer::new(config.debounce),
            min_len: config.min_query_len,
            latest: Arc::new(AtomicU64::new(0)),
            state: Arc::new(watch::Sender::new(SearchState::default())),
            search,
        }
    }

    pub fn set_query(&self, raw: &str) {
        let query = raw.trim().to_string();
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if query.chars().count() < self.min_len {
            self.debouncer.cancel();
            self.state.send_replace(SearchState {
                query,
                ..SearchState::default()
            });
            return;
        }

        self.state.send_modify(|state| {
            state.query.clone_from(&query);
            state.pending = true;
        });

        let search = Arc::clone(&self.search);
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.latest);
        self.debouncer.schedule(move || async move {
            debug!(len = query.len(), "issuing debounced search");
            let outcome = search(query.clone()).await;
            if latest.load(Ordering::SeqCst) != seq {
                return;
            }
            let next = match outcome {
                Ok(results) => SearchState {
                    query,
                    results,
                    error: None,
                    pending: false,
                },
                Err(err) => SearchState {
                    query,
                    results: Vec::new(),
                    error: Some(err),
                    pending: false,
                },
            };
            state.send_replace(next);
        });
    }

    pub fn current(&self) -> SearchState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState<T>> {
        self.state.subscribe()
    }
}
