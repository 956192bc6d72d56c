//! SQLite-backed state store for plans that must survive restarts.
//!
//! One `state` table keyed by the composite string key, JSON value column.
//! The store keeps the [`StateStore`] mapping semantics: reads and writes
//! are whole-value per key. Backend failures on the infallible trait
//! methods are reported to stderr and degrade to "key absent", which the
//! manager treats as a fresh tree.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::PathBuf;
use subtask_manager_sdk::StateStore;

pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Open (or create) a database file and initialize the schema.
    pub fn open(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing and ephemeral runs)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;
        Ok(())
    }

    /// Number of stored keys, for inspection.
    pub fn key_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM state", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        let text: String = self
            .conn
            .query_row("SELECT value FROM state WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .unwrap_or_else(|e| {
                eprintln!("sqlite state read failed for {key}: {e}");
                None
            })?;
        serde_json::from_str(&text).ok()
    }

    fn set(&mut self, key: &str, value: Value) {
        let text = value.to_string();
        let result = self.conn.execute(
            "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, text],
        );
        if let Err(e) = result {
            eprintln!("sqlite state write failed for {key}: {e}");
        }
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        let existing = self.get(key);
        if existing.is_some() {
            let result = self
                .conn
                .execute("DELETE FROM state WHERE key = ?1", params![key]);
            if let Err(e) = result {
                eprintln!("sqlite state delete failed for {key}: {e}");
            }
        }
        existing
    }
}
