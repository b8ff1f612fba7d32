use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a fetched value is served without revalidation.
    pub fresh_ttl: Duration,
    /// How long a failed fetch is answered from the cache.
    pub negative_ttl: Duration,
    /// How long a stale value is kept past `fresh_ttl` before it is evicted.
    pub retention: Duration,
    /// Quiet period before a free-text query is issued.
    pub debounce: Duration,
    /// Trimmed queries shorter than this (in characters) are never issued.
    pub min_query_len: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(5),
            retention: Duration::from_secs(300),
            debounce: Duration::from_millis(300),
            min_query_len: 4,
        }
    }
}
