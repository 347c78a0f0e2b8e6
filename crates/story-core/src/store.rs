//! Draft persistence.
//!
//! [`DraftBackend`] is the swappable key-value port (get/set/remove of one
//! opaque string). [`DraftStore`] sits on top of it and owns the single draft
//! key and the JSON encoding. The store never reports failures to its
//! callers: a failed write is logged and dropped, and a missing or corrupt
//! draft both load as `None`.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use jiff::Timestamp;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    error::{DatabaseResultExt, Result},
    models::SubmissionData,
};

/// Key under which the draft is stored unless configured otherwise.
pub const DEFAULT_DRAFT_KEY: &str = "story-submission-draft";

/// Key-value storage port for drafts.
pub trait DraftBackend: Send + Sync {
    /// Returns the stored value, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the stored value; removing nothing is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-backed draft storage.
pub struct SqliteBackend {
    connection: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) the database file and initializes the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection =
            Connection::open(path).db_context("Failed to open database connection")?;
        Self::with_connection(connection)
    }

    /// Opens a private in-memory SQLite database.
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().db_context("Failed to open in-memory database")?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        let schema_sql = include_str!("../assets/schema.sql");
        connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DraftBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.connection()
            .query_row(
                "SELECT value FROM drafts WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .db_context("Failed to read draft")
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Timestamp::now().to_string();
        self.connection()
            .execute(
                "INSERT INTO drafts (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, &now],
            )
            .db_context("Failed to write draft")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.connection()
            .execute("DELETE FROM drafts WHERE key = ?1", params![key])
            .db_context("Failed to delete draft")?;
        Ok(())
    }
}

/// Process-local draft storage, lost on exit.
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DraftBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Reads and writes the single draft snapshot.
#[derive(Clone)]
pub struct DraftStore {
    backend: Arc<dyn DraftBackend>,
    key: String,
}

impl DraftStore {
    pub fn new(backend: Arc<dyn DraftBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serializes and writes `data`. Failures are logged and swallowed.
    pub fn save(&self, data: &SubmissionData) {
        let json = match serde_json::to_string(data) {
            Ok(json) => json,
            Err(e) => {
                warn!("Skipping draft save, serialization failed: {e}");
                return;
            }
        };

        match self.backend.set(&self.key, &json) {
            Ok(()) => debug!("Draft saved under '{}' ({} bytes)", self.key, json.len()),
            Err(e) => warn!("Draft save failed: {e}"),
        }
    }

    /// Loads the stored draft. Missing, unreadable and corrupt drafts all
    /// yield `None`.
    pub fn load(&self) -> Option<SubmissionData> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Draft load failed: {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Ignoring corrupt draft under '{}': {e}", self.key);
                None
            }
        }
    }

    /// Removes the stored draft. Failures are logged and swallowed.
    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(&self.key) {
            warn!("Draft removal failed: {e}");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Backend doubles shared by unit tests.

    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Barrier,
    };

    use super::*;
    use crate::error::WizardError;

    /// Memory backend that counts writes.
    #[derive(Default)]
    pub struct CountingBackend {
        pub inner: MemoryBackend,
        pub writes: AtomicUsize,
    }

    impl CountingBackend {
        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl DraftBackend for CountingBackend {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    /// Memory backend whose first write waits at a two-party barrier twice:
    /// once when the write starts and once before it completes.
    pub struct GatedBackend {
        pub inner: MemoryBackend,
        pub gate: Barrier,
        opened: AtomicBool,
    }

    impl Default for GatedBackend {
        fn default() -> Self {
            Self {
                inner: MemoryBackend::default(),
                gate: Barrier::new(2),
                opened: AtomicBool::new(false),
            }
        }
    }

    impl DraftBackend for GatedBackend {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if !self.opened.swap(true, Ordering::SeqCst) {
                self.gate.wait();
                self.gate.wait();
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    /// Backend whose every operation fails.
    pub struct BrokenBackend;

    impl DraftBackend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(WizardError::Configuration {
                message: "storage unavailable".to_string(),
            })
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(WizardError::Configuration {
                message: "quota exceeded".to_string(),
            })
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(WizardError::Configuration {
                message: "storage unavailable".to_string(),
            })
        }
    }
}
