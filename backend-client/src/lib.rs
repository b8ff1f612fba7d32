//! Typed HTTP client for the storefront BFF.
//!
//! Every call returns `Result<_, NormalizedError>`: transport failures are
//! `Unreachable`, error responses are rebuilt from the BFF's error body, and
//! a 2xx body that does not decode is `Unknown`.

mod client;

pub use client::BffClient;
pub use client::ClientBuildError;
pub use client::DEFAULT_TIMEOUT;
