//! SQLite-backed store for notifications and the activity log
//!
//! This module provides the persistence primitives the subsystem is built on:
//! - Atomic single-row and batch inserts
//! - Atomic batch update/delete inside one transaction
//! - Ordered range queries with offset/limit and predicate filtering
//!
//! Unlike a cache, the store holds primary data. A schema version mismatch
//! is reported, never repaired by dropping tables.

mod activity;
mod notifications;
mod schema;
mod types;

pub use activity::ActivityQuery;
pub use notifications::NotificationQuery;
pub use types::{days_from_now, format_timestamp, parse_timestamp, retention_cutoff, timestamp_now};

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use miette::Diagnostic;
use rusqlite::Connection;
use thiserror::Error;

use crate::core::project::Project;

/// Store file location within a project
pub const STORE_FILE: &str = ".floor/floor.db";

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by the store
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("database error: {0}")]
    #[diagnostic(code(floor::store::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not serialize stored data: {0}")]
    #[diagnostic(code(floor::store::serialization))]
    Serialization(#[from] serde_json::Error),

    #[error("store schema version {found} does not match expected version {expected}")]
    #[diagnostic(
        code(floor::store::schema_mismatch),
        help("this database was written by a different release of floor")
    )]
    SchemaMismatch { found: i32, expected: i32 },

    #[error("store connection is unavailable after a panic in another thread")]
    #[diagnostic(code(floor::store::poisoned))]
    Poisoned,

    #[error("IO error: {0}")]
    #[diagnostic(code(floor::store::io))]
    Io(#[from] std::io::Error),
}

/// The notification and activity store backed by SQLite
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create the store for a project
    pub fn open_project(project: &Project) -> Result<Self, StoreError> {
        Self::open(&project.root().join(STORE_FILE))
    }

    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets readers proceed while another process writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.prepare()?;
        Ok(store)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.prepare()?;
        Ok(store)
    }

    /// Location of the database file, if not in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn prepare(&self) -> Result<(), StoreError> {
        let found = self.schema_version()?;
        match found {
            None => self.init_schema(),
            Some(version) if version == SCHEMA_VERSION => Ok(()),
            Some(version) => Err(StoreError::SchemaMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run a closure against the connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock()?;
        f(&mut conn)
    }

    /// Run a closure inside a transaction; commits only if the closure succeeds
    pub(crate) fn in_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
