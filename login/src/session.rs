//! Client-resident authentication state.
//!
//! `Hydrating` is entered once at construction. From there the store moves
//! to `Anonymous` or `Authenticated`, and `Authenticated` only leaves via
//! `LoggingOut`. The token and the user always travel together inside
//! [`Session`], so one can never be present without the other.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use staybook_protocol::AuthToken;
use staybook_protocol::ErrorKind;
use staybook_protocol::LoginRequest;
use staybook_protocol::LoginSuccess;
use staybook_protocol::NormalizedError;
use staybook_protocol::Registration;
use staybook_protocol::UserRecord;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::api::AuthApi;
use crate::navigator::Navigator;
use crate::storage::SessionStorage;
use crate::storage::StoredSession;

pub const DEFAULT_REVOKE_TIMEOUT: Duration = Duration::from_secs(5);

const REGISTERED: &str = "Registration successful. Please log in.";
const SAVE_FAILED: &str = "We couldn't save your session. Please try again.";
const LOGIN_SUPERSEDED: &str = "Login was cancelled because you logged out.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Where a successful login lands.
    pub post_login_path: String,
    /// Where a successful registration lands.
    pub login_path: String,
    /// Anonymous landing page after logout.
    pub landing_path: String,
    pub revoke_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            post_login_path: "/".to_string(),
            login_path: "/login".to_string(),
            landing_path: "/".to_string(),
            revoke_timeout: DEFAULT_REVOKE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: AuthToken,
    pub user: UserRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Hydrating,
    Anonymous,
    Authenticated(Session),
    LoggingOut,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Banner shown above forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Success(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Self::Error(message) | Self::Success(message) => message,
        }
    }
}

/// Something holding data that belongs to the signed-in user.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_user_scope(&self);
}

pub struct SessionStore {
    pub(crate) state: watch::Sender<SessionState>,
    notice: watch::Sender<Option<Notice>>,
    pub(crate) storage: Arc<dyn SessionStorage>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) api: Arc<dyn AuthApi>,
    invalidators: Mutex<Vec<Arc<dyn CacheInvalidator>>>,
    pub(crate) config: SessionConfig,
    hydrated: AtomicBool,
    /// Set when the server rejected the current token; cleared by the next
    /// login or logout.
    pub(crate) expired: AtomicBool,
    /// Bumped by every logout; a login that started under an older value,
    /// or that finishes while a logout is running, is discarded.
    pub(crate) generation: AtomicU64,
    /// Serializes login and registration.
    auth_lock: tokio::sync::Mutex<()>,
    /// Held across every read-modify-write of durable storage.
    storage_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
        api: Arc<dyn AuthApi>,
        config: SessionConfig,
    ) -> Self {
        Self {
            state: watch::Sender::new(SessionState::Hydrating),
            notice: watch::Sender::new(None),
            storage,
            navigator,
            api,
            invalidators: Mutex::new(Vec::new()),
            config,
            hydrated: AtomicBool::new(false),
            expired: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            auth_lock: tokio::sync::Mutex::new(()),
            storage_lock: Mutex::new(()),
        }
    }

    /// Register a cache to clear on login, logout and checkout.
    pub fn add_invalidator(&self, invalidator: Arc<dyn CacheInvalidator>) {
        self.invalidators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invalidator);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Restore the persisted session. Runs once; later calls only report
    /// the current state.
    ///
    /// A missing, malformed or half-present pair yields `Anonymous` and is
    /// wiped from storage. A login that finished first is left alone.
    pub fn hydrate(&self) -> SessionState {
        if self.hydrated.swap(true, Ordering::SeqCst) {
            return self.state();
        }

        let restored = {
            let _storage = self.lock_storage();
            match self.storage.read() {
                Ok(stored) => {
                    let session = restore(&stored);
                    if session.is_none() && !stored.is_empty() {
                        warn!("discarding incomplete persisted session");
                        self.clear_storage_logged();
                    }
                    session
                }
                Err(err) => {
                    warn!(error = %err, "could not read persisted session; starting anonymous");
                    self.clear_storage_logged();
                    None
                }
            }
        };

        let authenticated = restored.is_some();
        let applied = self.state.send_if_modified(|state| {
            if !matches!(state, SessionState::Hydrating) {
                return false;
            }
            *state = match restored {
                Some(session) => SessionState::Authenticated(session),
                None => SessionState::Anonymous,
            };
            true
        });
        if applied {
            debug!(authenticated, "session hydrated");
        } else {
            debug!("hydration skipped; session already settled");
        }
        self.state()
    }

    /// Authenticate against the login endpoint.
    ///
    /// On failure a notice is set, prior state is untouched and the
    /// normalized error is returned.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<(), NormalizedError> {
        let _serial = self.auth_lock.lock().await;
        let generation = self.generation.load(Ordering::SeqCst);

        let success = match self.api.login(credentials).await {
            Ok(success) => success,
            Err(err) => return Err(self.fail_with_notice("login", err)),
        };
        self.commit_login(generation, success)?;

        self.set_notice(None);
        self.invalidate_user_scope();
        info!("login succeeded");
        if let Err(err) = self.navigator.navigate(&self.config.post_login_path) {
            warn!(error = %err, "post-login navigation failed; reloading");
            self.navigator.hard_reload();
        }
        Ok(())
    }

    fn commit_login(&self, generation: u64, success: LoginSuccess) -> Result<(), NormalizedError> {
        let _storage = self.lock_storage();
        if self.generation.load(Ordering::SeqCst) != generation
            || matches!(*self.state.borrow(), SessionState::LoggingOut)
        {
            info!("discarding login result; a logout started while it was in flight");
            return Err(NormalizedError::new(ErrorKind::Unauthenticated)
                .with_message(LOGIN_SUPERSEDED));
        }

        let stored = StoredSession {
            token: Some(success.token.expose().to_string()),
            user: Some(success.user.to_storage_string()),
        };
        if let Err(err) = self.storage.write(&stored) {
            error!(error = %err, "could not persist session");
            self.clear_storage_logged();
            let err = NormalizedError::new(ErrorKind::Unknown)
                .with_message(SAVE_FAILED)
                .with_cause(err);
            self.set_notice(Some(Notice::Error(err.message.clone())));
            return Err(err);
        }

        self.state.send_replace(SessionState::Authenticated(Session {
            token: success.token,
            user: success.user,
        }));
        self.expired.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Create an account. Never authenticates; success lands on the login
    /// page with a success notice.
    pub async fn register(&self, registration: &Registration) -> Result<(), NormalizedError> {
        let _serial = self.auth_lock.lock().await;
        match self.api.register(registration).await {
            Ok(success) => {
                let message = success.message.unwrap_or_else(|| REGISTERED.to_string());
                self.set_notice(Some(Notice::Success(message)));
                info!("registration succeeded");
                if let Err(err) = self.navigator.navigate(&self.config.login_path) {
                    warn!(error = %err, "post-registration navigation failed");
                }
                Ok(())
            }
            Err(err) => Err(self.fail_with_notice("register", err)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn token(&self) -> Option<AuthToken> {
        self.state.borrow().session().map(|session| session.token.clone())
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.state.borrow().session().map(|session| session.user.clone())
    }

    /// Watch state transitions, e.g. to re-render on change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The server answered `Unauthenticated` for the current token.
    ///
    /// The session is kept; the user is asked to log in again and decides
    /// whether to log out.
    pub fn session_expired(&self) {
        if !self.is_authenticated() {
            return;
        }
        if !self.expired.swap(true, Ordering::SeqCst) {
            warn!("server rejected the session token");
        }
        self.set_notice(Some(Notice::Error(NormalizedError::unauthenticated().message)));
    }

    pub fn is_session_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }

    pub fn subscribe_notice(&self) -> watch::Receiver<Option<Notice>> {
        self.notice.subscribe()
    }

    pub fn dismiss_notice(&self) {
        self.set_notice(None);
    }

    /// Drop every user-scoped cache entry.
    pub fn invalidate_user_scope(&self) {
        let invalidators = self
            .invalidators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for invalidator in invalidators {
            invalidator.invalidate_user_scope();
        }
    }

    fn set_notice(&self, notice: Option<Notice>) {
        self.notice.send_if_modified(|current| {
            if *current == notice {
                return false;
            }
            *current = notice;
            true
        });
    }

    fn fail_with_notice(&self, operation: &str, err: NormalizedError) -> NormalizedError {
        warn!(
            operation,
            kind = %err.kind,
            status = err.http_status,
            cause = err.cause.as_deref().unwrap_or(""),
            "auth call failed"
        );
        self.set_notice(Some(Notice::Error(err.display_message())));
        err
    }

    pub(crate) fn lock_storage(&self) -> MutexGuard<'_, ()> {
        self.storage_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_storage_logged(&self) {
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "could not clear persisted session");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn restore(stored: &StoredSession) -> Option<Session> {
    let token = stored.token.as_deref().and_then(AuthToken::new)?;
    let user = stored
        .user
        .as_deref()
        .and_then(UserRecord::from_storage_str)?;
    Some(Session { token, user })
}
