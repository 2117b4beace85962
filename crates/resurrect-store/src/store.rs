use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::db::init_db;
use crate::error::{Result, StoreError};

/// Durable key-value storage scoped to one managed application instance.
///
/// Values are JSON documents. Read-modify-write is confined to a single hook
/// invocation, so implementations only need to be internally consistent,
/// not transactional across calls.
pub trait StateStore: Send + Sync {
    /// Return the value under `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace the value under `key`.
    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Drop `key`. Silent no-op if it does not exist.
    fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-backed store. One row per key in the `state` table.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!(path = %path.as_ref().display(), "state store opened");
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-call; the
        // connection itself is still usable.
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for SqliteStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let db = self.conn();
        match db.query_row(
            "SELECT value FROM state WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = unix_now();
        self.conn().execute(
            "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![key, raw, now],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM state WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
    }
}

/// Process-local store. Nothing survives the process; useful for tests and
/// for owners that persist state some other way.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.slots().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.slots().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots().remove(key);
        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        // Fallback to 0 only if the system clock is broken.
        .unwrap_or_default()
        .as_secs() as i64
}
