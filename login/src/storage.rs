//! Durable storage for the session pair.
//!
//! Storage location: ~/.staybook/session.json (override the directory with
//! `STAYBOOK_HOME`). The file holds two string entries, `token` and `user`,
//! and is always replaced as a whole so the two never disagree on disk.

use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Default filename for the persisted session.
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to replace session file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Raw persisted entries. Either half may be missing or stale; validating
/// them is the session store's job.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl StoredSession {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }
}

impl fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSession")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user.as_ref().map(String::len))
            .finish()
    }
}

/// Where the session pair survives a restart.
pub trait SessionStorage: Send + Sync {
    fn read(&self) -> Result<StoredSession, StorageError>;

    /// Replace both entries at once.
    fn write(&self, session: &StoredSession) -> Result<(), StorageError>;

    /// Remove both entries. Clearing an absent session succeeds.
    fn clear(&self) -> Result<(), StorageError>;
}

/// JSON file storage, written with a temp file + rename and mode 0600.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    file_path: PathBuf,
}

impl FileSessionStorage {
    /// Storage at the default location (~/.staybook/session.json).
    pub fn new() -> io::Result<Self> {
        let home = default_staybook_home()?;
        Ok(Self::with_path(home.join(SESSION_FILE)))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { file_path: path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl SessionStorage for FileSessionStorage {
    fn read(&self) -> Result<StoredSession, StorageError> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(StoredSession::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, session: &StoredSession) -> Result<(), StorageError> {
        let parent = match self.file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let content = serde_json::to_string_pretty(session)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;

        // Set file permissions to user-only (Unix)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.file_path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local storage for embeddings without a filesystem, and tests.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    inner: Mutex<StoredSession>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: StoredSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    pub fn snapshot(&self) -> StoredSession {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn read(&self) -> Result<StoredSession, StorageError> {
        Ok(self.snapshot())
    }

    fn write(&self, session: &StoredSession) -> Result<(), StorageError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = StoredSession::default();
        Ok(())
    }
}

/// ~/.staybook unless `STAYBOOK_HOME` is set.
pub fn default_staybook_home() -> io::Result<PathBuf> {
    if let Ok(home) = std::env::var("STAYBOOK_HOME") {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not determine home directory")
    })?;

    Ok(home.join(".staybook"))
}
