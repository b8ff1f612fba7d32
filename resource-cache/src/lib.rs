//! Client-side request cache for storefront resources.
//!
//! - [`ResourceCache`]: one in-flight fetch per key, stale-while-revalidate,
//!   short negative caching, scope-based invalidation.
//! - [`DebouncedSearch`]: debounced free-text queries with a minimum length.
//! - [`StorefrontResources`]: the storefront's resources wired to the BFF
//!   client and the session token.

mod cache;
mod config;
mod key;
mod resources;
mod search;

pub use cache::EntrySnapshot;
pub use cache::EntryState;
pub use cache::ResourceCache;
pub use config::CacheConfig;
pub use key::CacheKey;
pub use key::Scope;
pub use resources::StorefrontResources;
pub use search::DebouncedSearch;
pub use search::SearchFn;
pub use search::SearchState;
