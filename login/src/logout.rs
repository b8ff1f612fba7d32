//! Logout as a sequence of independently failable steps.
//!
//! Whatever the collaborators do, the store ends `Anonymous`:
//!
//! 1. snapshot the session and move to `LoggingOut`;
//! 2. invalidate user-scoped caches;
//! 3. clear durable storage;
//! 4. navigate to the landing page, or hard-reload if routing fails;
//! 5. once `Anonymous`, revoke the token server-side with the snapshot.
//!
//! A panic in steps 2-4 triggers an emergency pass that repeats them, and a
//! hard reload if that fails too. The revoke outcome is logged and reported
//! but never changes state.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use staybook_protocol::AuthToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::session::SessionState;
use crate::session::SessionStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepOutcome {
    #[default]
    Skipped,
    Done,
    Failed(String),
    Panicked,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// What each logout step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutReport {
    /// False when there was no session to end.
    pub performed: bool,
    pub cache: StepOutcome,
    pub storage: StepOutcome,
    pub navigation: StepOutcome,
    /// Set when the emergency pass ran.
    pub emergency: Option<StepOutcome>,
    pub hard_reload: bool,
    pub revoke: StepOutcome,
}

impl LogoutReport {
    fn any_panicked(&self) -> bool {
        [&self.cache, &self.storage, &self.navigation]
            .into_iter()
            .any(|step| *step == StepOutcome::Panicked)
    }
}

impl SessionStore {
    /// End the session locally, then revoke it upstream.
    ///
    /// A no-op (and no revoke call) when nobody is logged in.
    pub async fn logout(&self) -> LogoutReport {
        // Any login still in flight must not resurrect the session.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if matches!(*self.state.borrow(), SessionState::Hydrating) {
            self.hydrate();
        }

        let mut snapshot = None;
        self.state.send_if_modified(|state| {
            match std::mem::replace(state, SessionState::LoggingOut) {
                SessionState::Authenticated(session) => {
                    snapshot = Some(session);
                    true
                }
                previous => {
                    *state = previous;
                    false
                }
            }
        });
        let Some(session) = snapshot else {
            debug!("logout without a session; nothing to do");
            return LogoutReport::default();
        };
        info!("logging out");

        let mut report = LogoutReport {
            performed: true,
            ..LogoutReport::default()
        };
        report.cache = run_step("invalidate cache", || {
            self.invalidate_user_scope();
            Ok(())
        });
        report.storage = run_step("clear storage", || {
            let _storage = self.lock_storage();
            self.storage.clear().map_err(|err| err.to_string())
        });
        report.navigation = run_step("navigate", || {
            self.navigator
                .navigate(&self.config.landing_path)
                .map_err(|err| err.to_string())
        });
        if matches!(report.navigation, StepOutcome::Failed(_)) {
            report.hard_reload = self.force_reload();
        }

        if report.any_panicked() {
            error!("logout step panicked; running emergency cleanup");
            let emergency = self.emergency_cleanup();
            if !emergency.is_done() {
                report.hard_reload = self.force_reload();
            }
            report.emergency = Some(emergency);
        }

        self.finish_logout();
        report.revoke = self.revoke(session.token).await;
        report
    }

    fn emergency_cleanup(&self) -> StepOutcome {
        run_step("emergency cleanup", || {
            {
                let _storage = self.lock_storage();
                if let Err(err) = self.storage.clear() {
                    warn!(error = %err, "emergency storage clear failed");
                }
            }
            self.finish_logout();
            self.invalidate_user_scope();
            self.navigator
                .navigate(&self.config.landing_path)
                .map_err(|err| err.to_string())
        })
    }

    /// `LoggingOut -> Anonymous`; any other state is left as is.
    fn finish_logout(&self) {
        self.state.send_if_modified(|state| {
            if !matches!(state, SessionState::LoggingOut) {
                return false;
            }
            *state = SessionState::Anonymous;
            true
        });
        self.expired.store(false, Ordering::SeqCst);
    }

    /// Returns whether the reload was issued without panicking.
    fn force_reload(&self) -> bool {
        let reloaded = std::panic::catch_unwind(AssertUnwindSafe(|| self.navigator.hard_reload()));
        if reloaded.is_err() {
            error!("hard reload panicked");
        }
        reloaded.is_ok()
    }

    async fn revoke(&self, token: AuthToken) -> StepOutcome {
        let call = AssertUnwindSafe(self.api.revoke(&token)).catch_unwind();
        match tokio::time::timeout(self.config.revoke_timeout, call).await {
            Ok(Ok(Ok(()))) => {
                debug!("token revoked");
                StepOutcome::Done
            }
            Ok(Ok(Err(err))) => {
                warn!(
                    kind = %err.kind,
                    cause = err.cause.as_deref().unwrap_or(""),
                    "token revocation failed"
                );
                StepOutcome::Failed(err.to_string())
            }
            Ok(Err(_)) => {
                error!("token revocation panicked");
                StepOutcome::Panicked
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.revoke_timeout.as_millis() as u64,
                    "token revocation timed out"
                );
                StepOutcome::Failed("timed out".to_string())
            }
        }
    }
}

fn run_step<F>(step: &str, f: F) -> StepOutcome
where
    F: FnOnce() -> Result<(), String>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => StepOutcome::Done,
        Ok(Err(reason)) => {
            warn!(step, %reason, "logout step failed");
            StepOutcome::Failed(reason)
        }
        Err(_) => {
            error!(step, "logout step panicked");
            StepOutcome::Panicked
        }
    }
}
