//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex. The handle is created
//! explicitly (with a bounded retry loop), shared by the repositories through
//! an `Arc`, and closed explicitly when the run ends.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use medvid_core::config::{expand_home, StorageConfig};
use medvid_core::error::{MedvidError, Result};

use crate::migrations;

/// Where the database lives, parsed from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    Memory,
    File(PathBuf),
}

/// Parse a connection string into a [`DbTarget`].
///
/// Accepts `sqlite://<path>`, `sqlite:<path>`, a bare filesystem path, or
/// `:memory:`. Any other URL scheme is rejected.
pub fn parse_database_url(url: &str) -> Result<DbTarget> {
    let url = url.trim();
    if url.is_empty() {
        return Err(MedvidError::Config("database URL is empty".to_string()));
    }

    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);

    if rest.contains("://") {
        return Err(MedvidError::Config(format!(
            "unsupported database URL scheme: {}",
            url
        )));
    }

    // Drop any query string (e.g. `?mode=rwc`); flags come from config.
    let rest = rest.split('?').next().unwrap_or(rest);

    match rest {
        "" => Err(MedvidError::Config(format!("database URL has no path: {}", url))),
        ":memory:" => Ok(DbTarget::Memory),
        path => Ok(DbTarget::File(expand_home(path))),
    }
}

/// Log a rusqlite failure with context and convert it to a storage error.
pub(crate) fn storage_error(context: &str, err: rusqlite::Error) -> MedvidError {
    error!(error = %err, "{}", context);
    MedvidError::Storage(format!("{}: {}", context, err))
}

/// SQLite database handle.
///
/// Uses WAL mode and enforces foreign keys. The connection is wrapped in a
/// Mutex since rusqlite Connection is not Sync.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Connect using the storage configuration.
    ///
    /// Makes up to `connect_attempts` attempts, sleeping a fixed
    /// `connect_retry_delay_ms` before every attempt after the first. Each
    /// attempt is validated with a liveness query. On success the schema is
    /// initialized once before the handle is returned.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let target = parse_database_url(&config.database_url)?;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let delay = Duration::from_millis(config.connect_retry_delay_ms);
        let attempts = config.connect_attempts.max(1);

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
            }

            match Self::open_target(&target, busy_timeout) {
                Ok(db) => {
                    info!(attempt, db = ?target, "Database connection established");
                    db.init_schema()?;
                    return Ok(db);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Database connection attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        error!(attempts, "Giving up on database connection");
        Err(MedvidError::Connection {
            attempts,
            message: last_error,
        })
    }

    /// Open (or create) a database file and initialize the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self::open_target(
            &DbTarget::File(path.to_path_buf()),
            Duration::from_millis(StorageConfig::default().busy_timeout_ms),
        )?;
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database with the schema applied (for testing).
    pub fn in_memory() -> Result<Self> {
        let db = Self::open_target(&DbTarget::Memory, Duration::ZERO)?;
        db.init_schema()?;
        Ok(db)
    }

    /// One connection attempt: open, configure pragmas, check liveness.
    fn open_target(target: &DbTarget, busy_timeout: Duration) -> Result<Self> {
        let conn = match target {
            DbTarget::Memory => Connection::open_in_memory()
                .map_err(|e| MedvidError::Storage(format!("Failed to open in-memory db: {}", e)))?,
            DbTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)
                    .map_err(|e| MedvidError::Storage(format!("Failed to open database: {}", e)))?
            }
        };

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| MedvidError::Storage(format!("Failed to set pragmas: {}", e)))?;

        if !busy_timeout.is_zero() {
            conn.busy_timeout(busy_timeout)
                .map_err(|e| MedvidError::Storage(format!("Failed to set busy timeout: {}", e)))?;
        }

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ping()?;
        debug!(db = ?target, "Database opened");
        Ok(db)
    }

    /// Create the tables if they do not exist. Safe to call repeatedly.
    pub fn init_schema(&self) -> Result<()> {
        self.with_conn(migrations::run_migrations)
    }

    /// Liveness check.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| MedvidError::Storage(format!("Liveness query failed: {}", e)))?;
            Ok(())
        })
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MedvidError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Close the connection. Statements still pending in other threads are
    /// not waited for; the caller must own the only handle.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| MedvidError::Storage(format!("Database lock poisoned: {}", e)))?;
        conn.close()
            .map_err(|(_, e)| MedvidError::Storage(format!("Failed to close database: {}", e)))?;
        info!("Database connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
