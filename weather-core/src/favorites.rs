//! SQLite-backed list of favorite city names.
//!
//! One table, one statement per operation. Names are matched exactly
//! (case-sensitive); trimming and emptiness checks are the caller's job, see
//! [`crate::model::normalize_city`].

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::error::StorageError;

const SCHEMA_VERSION: i32 = 1;

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable set of favorite cities.
pub struct FavoritesStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore").finish_non_exhaustive()
    }
}

impl FavoritesStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened favorites database");
        Self::with_connection(conn)
    }

    /// In-memory store; contents vanish on drop.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Insert `city` if absent. `Ok(true)` iff a row was inserted.
    pub fn add(&self, city: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let inserted =
            conn.execute("INSERT OR IGNORE INTO favorites (city) VALUES (?1)", params![city])?;
        tracing::debug!(city, inserted = inserted > 0, "add favorite");
        Ok(inserted > 0)
    }

    /// Delete `city`. `Ok(true)` iff a row was deleted.
    pub fn remove(&self, city: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM favorites WHERE city = ?1", params![city])?;
        tracing::debug!(city, deleted = deleted > 0, "remove favorite");
        Ok(deleted > 0)
    }

    pub fn contains(&self, city: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row("SELECT 1 FROM favorites WHERE city = ?1", params![city], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// All favorites in storage order. Not sorted.
    pub fn list_all(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT city FROM favorites ORDER BY id")?;
        let cities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cities)
    }

    /// Flip membership of `city`; returns whether it is a favorite afterwards.
    pub fn toggle(&self, city: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM favorites WHERE city = ?1", params![city])?;
        if deleted > 0 {
            tracing::debug!(city, "toggled favorite off");
            return Ok(false);
        }
        conn.execute("INSERT OR IGNORE INTO favorites (city) VALUES (?1)", params![city])?;
        tracing::debug!(city, "toggled favorite on");
        Ok(true)
    }
}

/// Create the table, dropping it first when the stored schema version differs.
/// Favorites are cheap to re-enter, so there is no data-preserving migration.
fn init_schema(conn: &Connection) -> StorageResult<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version != SCHEMA_VERSION {
        if version != 0 {
            tracing::info!(from = version, to = SCHEMA_VERSION, "recreating favorites table");
        }
        conn.execute_batch("DROP TABLE IF EXISTS favorites;")?;
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city TEXT UNIQUE
        );",
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
