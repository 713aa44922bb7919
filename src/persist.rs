//! Persistence of the `projects`, `tuning`, and `user` slices between
//! runs, through a key-value storage adapter. The `selected` and
//! `commits` slices are transient and never written.

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::store::{AppState, SharedStore, Slice};

pub const KEY_PROJECTS: &str = "projects";
pub const KEY_TUNING: &str = "tuning";
pub const KEY_USER: &str = "user";

/// Key-value storage seam. Production uses SQLite; tests can substitute
/// an in-memory map.
pub trait KvStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS slices (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStorage for SqliteStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM slices WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO slices (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// Build the initial app state: persisted slices loaded, transient slices
/// at their defaults. A missing or unreadable slice falls back to its
/// default rather than failing startup.
pub fn hydrate(storage: &dyn KvStorage) -> AppState {
    AppState {
        projects: load_slice(storage, KEY_PROJECTS),
        tuning: load_slice(storage, KEY_TUNING),
        user: load_slice(storage, KEY_USER),
        ..AppState::default()
    }
}

pub fn save_persisted(storage: &dyn KvStorage, state: &AppState) {
    save_slice(storage, KEY_PROJECTS, &state.projects);
    save_slice(storage, KEY_TUNING, &state.tuning);
    save_slice(storage, KEY_USER, &state.user);
}

fn load_slice<T: DeserializeOwned + Default>(storage: &dyn KvStorage, key: &str) -> T {
    match storage.load(key) {
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to load persisted slice");
            T::default()
        }
    }
}

fn save_slice<T: Serialize>(storage: &dyn KvStorage, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => {
            if let Err(e) = storage.save(key, &json) {
                warn!(key, error = %e, "Failed to save persisted slice");
            }
        }
        Err(e) => warn!(key, error = %e, "Failed to serialize slice"),
    }
}

/// Watch the store and write persisted slices whenever one of them
/// changes; flush once more on teardown.
pub fn spawn_persistence(
    store: SharedStore,
    storage: Arc<dyn KvStorage>,
) -> tokio::task::JoinHandle<()> {
    let mut events = store.subscribe();
    let mut shutdown = store.subscribe_shutdown();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event)
                        if matches!(event.slice, Slice::Projects | Slice::Tuning | Slice::User) =>
                    {
                        let state = store.snapshot().await;
                        save_persisted(storage.as_ref(), &state);
                        debug!(slice = ?event.slice, "Persisted slice change");
                    }
                    Ok(_) => {}
                    // Missed events are fine; the next write is a full save.
                    Err(RecvError::Lagged(_)) => {
                        let state = store.snapshot().await;
                        save_persisted(storage.as_ref(), &state);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.recv() => {
                    let state = store.snapshot().await;
                    save_persisted(storage.as_ref(), &state);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::open(&dir.path().join("kv.db")).unwrap();
        assert!(storage.load("projects").unwrap().is_none());

        storage.save("projects", "{\"entries\":{}}").unwrap();
        assert_eq!(
            storage.load("projects").unwrap().as_deref(),
            Some("{\"entries\":{}}")
        );

        storage.save("projects", "{}").unwrap();
        assert_eq!(storage.load("projects").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_save_persisted_excludes_transient_slices() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::open(&dir.path().join("kv.db")).unwrap();
        save_persisted(&storage, &AppState::default());

        assert!(storage.load(KEY_PROJECTS).unwrap().is_some());
        assert!(storage.load(KEY_TUNING).unwrap().is_some());
        assert!(storage.load(KEY_USER).unwrap().is_some());
        assert!(storage.load("selected").unwrap().is_none());
        assert!(storage.load("commits").unwrap().is_none());
    }

    #[test]
    fn test_hydrate_from_empty_storage_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::open(&dir.path().join("kv.db")).unwrap();
        let state = hydrate(&storage);
        assert!(state.projects.entries.is_empty());
        assert!(state.user.settings.name.is_none());
    }

    #[test]
    fn test_hydrate_recovers_saved_user() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::open(&dir.path().join("kv.db")).unwrap();
        let mut state = AppState::default();
        state.user.settings.name = Some("ada".to_string());
        save_persisted(&storage, &state);

        let restored = hydrate(&storage);
        assert_eq!(restored.user.settings.name.as_deref(), Some("ada"));
    }
}
