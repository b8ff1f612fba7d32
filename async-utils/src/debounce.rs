//! Trailing-edge debounce timer.
//!
//! Every call to [`Debouncer::schedule`] supersedes the previous one: the
//! earlier timer is cancelled outright and its action never runs. An action
//! that has already started is not interrupted.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::or_cancel;

#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<Inner>,
}

struct Inner {
    quiet: Duration,
    next_id: AtomicU64,
    pending: Mutex<Option<(u64, CancellationToken)>>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                quiet,
                next_id: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet
    }

    /// Run `action` once the quiet period elapses without another call.
    pub fn schedule<F, Fut>(&self, action: F) -> JoinHandle<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((id, token.clone()));
        if let Some((_, previous)) = previous {
            previous.cancel();
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if or_cancel(tokio::time::sleep(inner.quiet), &token).await.is_err() {
                tracing::trace!(id, "debounced action superseded");
                return;
            }
            {
                let mut pending = inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
                if matches!(pending.as_ref(), Some((current, _)) if *current == id) {
                    pending.take();
                }
            }
            action().await;
        })
    }

    /// Drop the pending action, if any, without running it.
    pub fn cancel(&self) {
        let previous = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((_, token)) = previous {
            token.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("quiet", &self.inner.quiet)
            .field("pending", &self.is_pending())
            .finish()
    }
}
