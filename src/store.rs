//! Cache persistence for resolved values.
//!
//! Values are plain strings keyed by media id inside one of three namespaces.
//! There is no expiry: entries are overwritten whenever a fresh resolution
//! happens and only disappear through [`CacheStore::purge`].

use std::{collections::HashMap, fmt, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

/// Separate key spaces so an album and a video sharing an id never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    AlbumDurations,
    VideoDurations,
    VideoThumbs,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::AlbumDurations,
        Namespace::VideoDurations,
        Namespace::VideoThumbs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::AlbumDurations => "albumdurations",
            Namespace::VideoDurations => "videodurations",
            Namespace::VideoThumbs => "videothumbs",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Get/set store the gateway writes through. Implementations use interior
/// mutability so a single store can be shared by reference.
pub trait CacheStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>>;
    fn set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()>;
    /// Drops every entry in every namespace.
    fn purge(&self) -> Result<()>;
}

/// Process-local store, used when no database path is configured and in
/// tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(Namespace, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .get(&(namespace, key.to_owned()))
            .cloned())
    }

    fn set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert((namespace, key.to_owned()), value.to_owned());
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// SQLite-backed store so cached values survive across processes.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the cache DB and ensures the table
    /// exists. WAL mode keeps concurrent readers from blocking a writer.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening cache DB {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("enabling WAL mode for cache DB")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("setting cache DB synchronous mode")?;

        let store = Self { conn };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS cache_entries (
                    namespace TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL DEFAULT '',
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (namespace, key)
                );
                "#,
            )
            .context("creating cache_entries table")?;
        Ok(())
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("reading {namespace}/{key} from cache DB"))
    }

    fn set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO cache_entries (namespace, key, value, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(namespace, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![namespace.as_str(), key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("writing {namespace}/{key} to cache DB"))?;
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM cache_entries", [])
            .context("purging cache DB")?;
        Ok(())
    }
}
