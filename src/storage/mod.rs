// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed knowledge storage.
//!
//! One database holds every logical store in its own table: code chunks,
//! commit analyses, code patterns, and a small `meta` key/value table.
//! Reads check a connection out of an r2d2 pool and may run concurrently;
//! writes additionally pass through a single write gate so at most one
//! insert transaction is in flight.

pub mod chunks;
pub mod commits;
pub mod patterns;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::errors::{KnowledgeError, Result};

pub use chunks::{ChunkMatch, CodeChunk, NewChunk, Query, SearchOptions};
pub use commits::{CommitAnalysisRecord, NewCommitAnalysis};
pub use patterns::{CodePattern, NewPattern, PatternMatch};

const SCHEMA_VERSION: &str = "1";

/// Meta key holding the embedding length shared by every stored vector.
pub(crate) const META_EMBEDDING_DIM: &str = "embedding_dim";

/// Counter for unique shared-cache in-memory database names
static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sets pragmas on every new connection to a file database
#[derive(Debug)]
struct FileConnectionInitializer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for FileConnectionInitializer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )
    }
}

/// WAL is not available for shared-cache in-memory databases
#[derive(Debug)]
struct MemoryConnectionInitializer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for MemoryConnectionInitializer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA busy_timeout=5000;")
    }
}

/// Shared storage handle for all knowledge tables.
pub struct Storage {
    pool: Pool<SqliteConnectionManager>,
    write_gate: Mutex<()>,
    path: Option<PathBuf>,
}

impl Storage {
    /// Opens or creates the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(&path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(FileConnectionInitializer))
            .build(manager)?;

        let storage = Self {
            pool,
            write_gate: Mutex::new(()),
            path: Some(path),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Creates an isolated in-memory database.
    ///
    /// The pool holds a single connection to a uniquely named shared-cache
    /// database, so reads and writes take turns instead of hitting table
    /// locks. The database lives as long as the pool does.
    pub fn in_memory() -> Result<Self> {
        let db_id = MEMORY_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let uri = format!("file:diffrag_mem{}?mode=memory&cache=shared", db_id);
        let manager = SqliteConnectionManager::file(uri);
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(MemoryConnectionInitializer))
            .build(manager)?;

        let storage = Self {
            pool,
            write_gate: Mutex::new(()),
            path: None,
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Returns the database file path, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Initializes the database schema if it does not exist.
    fn init_schema(&self) -> Result<()> {
        self.write(|tx| {
            tx.execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS code_chunks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                source_path TEXT NOT NULL,
                chunk_type TEXT NOT NULL,
                language TEXT NOT NULL,
                embedding BLOB NOT NULL,
                keywords TEXT NOT NULL,
                complexity_score INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS commit_analysis (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                commit_hash TEXT NOT NULL,
                commit_message TEXT NOT NULL,
                files_changed TEXT NOT NULL,
                classification TEXT NOT NULL,
                refactoring_type TEXT,
                complexity_change INTEGER NOT NULL,
                risk_score REAL NOT NULL,
                suggestions TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS code_patterns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                pattern_name TEXT NOT NULL,
                pattern_type TEXT NOT NULL,
                description TEXT NOT NULL,
                code_example TEXT NOT NULL,
                embedding BLOB NOT NULL,
                tags TEXT NOT NULL,
                confidence_score REAL NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        })
    }

    /// Checks out a pooled connection for reading.
    pub(crate) fn reader(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Runs `f` inside a single write transaction behind the write gate.
    ///
    /// Nothing `f` writes is visible unless it returns `Ok`.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Gets metadata value by key.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.reader()?;
        read_meta(&conn, key)
    }

    /// Embedding length recorded for this store, if any vector was stored.
    pub fn embedding_dimension(&self) -> Result<Option<usize>> {
        Ok(self
            .get_meta(META_EMBEDDING_DIM)?
            .and_then(|value| value.parse().ok()))
    }

    /// Records the store's embedding length on first use and rejects vectors
    /// of any other length afterwards.
    pub(crate) fn check_dimension(tx: &Transaction<'_>, len: usize) -> Result<()> {
        if len == 0 {
            return Err(KnowledgeError::MalformedInput(
                "embedding must not be empty".to_string(),
            ));
        }
        match read_meta(tx, META_EMBEDDING_DIM)? {
            Some(stored) if stored != len.to_string() => {
                Err(KnowledgeError::MalformedInput(format!(
                    "embedding dimension {} does not match store dimension {}",
                    len, stored
                )))
            }
            Some(_) => Ok(()),
            None => {
                tx.execute(
                    "INSERT OR IGNORE INTO meta (key, value) VALUES (?1, ?2)",
                    params![META_EMBEDDING_DIM, len.to_string()],
                )?;
                Ok(())
            }
        }
    }

    /// Converts an embedding vector to a compact blob.
    pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Converts a blob back to an embedding vector.
    pub(crate) fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Keeps candidates scoring strictly above `threshold`, orders them by
/// descending score and truncates to `limit`.
///
/// The sort is stable, so candidates supplied most-recent-first keep that
/// order among equal scores.
pub(crate) fn rank<T>(candidates: Vec<(T, f32)>, threshold: f32, limit: usize) -> Vec<(T, f32)> {
    let mut kept: Vec<(T, f32)> = candidates
        .into_iter()
        .filter(|(_, score)| *score > threshold)
        .collect();

    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    kept.truncate(limit);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn storage_create_and_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("knowledge.sqlite");

        let storage = Storage::open(&db_path, 2).unwrap();
        assert!(db_path.exists());
        assert_eq!(storage.path(), Some(db_path.as_path()));
        assert_eq!(storage.get_meta("schema_version").unwrap().as_deref(), Some("1"));
        drop(storage);

        let storage = Storage::open(&db_path, 2).unwrap();
        assert_eq!(storage.embedding_dimension().unwrap(), None);
    }

    #[test]
    fn blob_roundtrip_preserves_values() {
        let vector = vec![0.25, -1.5, 3.0e-7, f32::MAX];
        let blob = Storage::embedding_to_blob(&vector);
        assert_eq!(blob.len(), 16);
        assert_eq!(Storage::blob_to_embedding(&blob), vector);
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let storage = Storage::in_memory().unwrap();
        let result: Result<()> = storage.write(|tx| {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('partial', 'x')",
                [],
            )?;
            Err(KnowledgeError::MalformedInput("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(storage.get_meta("partial").unwrap(), None);
    }

    #[test]
    fn dimension_is_fixed_after_first_vector() {
        let storage = Storage::in_memory().unwrap();
        storage.write(|tx| Storage::check_dimension(tx, 3)).unwrap();
        storage.write(|tx| Storage::check_dimension(tx, 3)).unwrap();
        let err = storage
            .write(|tx| Storage::check_dimension(tx, 4))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::MalformedInput(_)));
        assert_eq!(storage.embedding_dimension().unwrap(), Some(3));
    }

    #[test]
    fn rank_filters_sorts_and_truncates() {
        let candidates = vec![("a", 0.2), ("b", 0.9), ("c", 0.5), ("d", 0.9), ("e", 0.31)];
        let ranked = rank(candidates, 0.3, 3);
        let names: Vec<&str> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["b", "d", "c"]);
    }

    #[test]
    fn rank_threshold_is_exclusive() {
        let ranked = rank(vec![("a", 0.3), ("b", 1.0)], 0.3, 10);
        assert_eq!(ranked.len(), 1);
        assert!(rank(vec![("a", 1.0)], 1.1, 10).is_empty());
    }
}
