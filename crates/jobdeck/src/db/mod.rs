//! SQLite persistence for tracked jobs.
//!
//! One connection behind a mutex; every repository call borrows it through
//! [`Database::with_conn`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

/// How long a write waits for another process holding the file lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the job database. Clones share the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the job database at `path`, creating it and its directory if
    /// needed, and migrates it to the current schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatabaseError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| DatabaseError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Self::prepare(conn)?;
        log::info!("Job database ready at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, mostly for tests and `persist = false`.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        let applied = migrations::run_all(&conn)?;
        if applied > 0 {
            log::debug!(
                "Applied {} schema step(s), now at v{}",
                applied,
                migrations::schema_version(&conn)?
            );
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| {
            log::warn!("Job database lock was poisoned, recovering");
            poisoned.into_inner()
        });
        f(&conn)
    }
}

/// `~/.jobdeck/data/jobdeck.db`, or `None` without a home directory.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".jobdeck").join("data").join("jobdeck.db"))
}
