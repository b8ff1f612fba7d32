use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("navigation to {path} failed: {reason}")]
pub struct NavigationError {
    pub path: String,
    pub reason: String,
}

/// Client-side router the session store drives after login, registration
/// and logout.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str) -> Result<(), NavigationError>;

    /// Full page reload. Last resort when routing itself is broken; a reload
    /// re-hydrates from durable storage.
    fn hard_reload(&self);
}

/// Navigator that only records where it was sent. Headless embeddings use
/// it to read the pending route.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
    reloads: AtomicUsize,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) -> Result<(), NavigationError> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        Ok(())
    }

    fn hard_reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}
