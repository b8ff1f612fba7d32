//! Client-side session lifecycle for the storefront.
//!
//! [`SessionStore`] owns who is logged in. It persists the session through a
//! [`SessionStorage`], routes through a [`Navigator`] and reaches the BFF
//! through an [`AuthApi`] (implemented for `BffClient`).

mod api;
mod logout;
mod navigator;
mod session;
mod storage;

pub use api::AuthApi;
pub use logout::LogoutReport;
pub use logout::StepOutcome;
pub use navigator::NavigationError;
pub use navigator::Navigator;
pub use navigator::RecordingNavigator;
pub use session::CacheInvalidator;
pub use session::DEFAULT_REVOKE_TIMEOUT;
pub use session::Notice;
pub use session::Session;
pub use session::SessionConfig;
pub use session::SessionState;
pub use session::SessionStore;
pub use storage::FileSessionStorage;
pub use storage::MemorySessionStorage;
pub use storage::SessionStorage;
pub use storage::StorageError;
pub use storage::StoredSession;
pub use storage::default_staybook_home;
