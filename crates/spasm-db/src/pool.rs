//! Connection pool for the event database.

use crate::migrations::{run_migrations, MigrationError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;
use thiserror::Error;

/// Runtime tunables for SQLite connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Maximum number of pooled connections for file databases.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to create database connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Where the event database lives, derived from the configured path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    /// `:memory:` (or an empty path): private to each connection.
    Memory,
    File,
}

impl Storage {
    fn of(db_path: &str) -> Self {
        if db_path.is_empty() || db_path == ":memory:" {
            Self::Memory
        } else {
            Self::File
        }
    }

    /// In-memory connections never share data, so such a pool holds one.
    fn pool_size(self, requested: u32) -> u32 {
        match self {
            Self::Memory => 1,
            Self::File => requested.max(1),
        }
    }
}

fn init_connection(
    conn: &mut Connection,
    storage: Storage,
    busy_timeout: Duration,
) -> rusqlite::Result<()> {
    // Set first so switching to WAL waits on a locked file.
    conn.busy_timeout(busy_timeout)?;

    if storage == Storage::File {
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("journal_mode stayed at {mode}")),
            ));
        }
    }

    // Deleting an event cascades to its id, parent, signer, category and
    // keyword rows.
    conn.pragma_update(None, "foreign_keys", true)
}

/// Builds a pool for the event database at `db_path`.
///
/// File databases run in WAL mode. An in-memory path always gets a
/// single-connection pool, whatever `settings.pool_max_size` says.
///
/// # Errors
///
/// Returns `DbError::Pool` if the pool cannot be built.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, DbError> {
    let storage = Storage::of(db_path);
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let pool_size = storage.pool_size(settings.pool_max_size);
    if pool_size != settings.pool_max_size {
        tracing::warn!(
            requested = settings.pool_max_size,
            pool_size,
            "adjusted database pool size"
        );
    }

    let manager = SqliteConnectionManager::file(db_path)
        .with_init(move |conn| init_connection(conn, storage, busy_timeout));
    let pool = Pool::builder().max_size(pool_size).build(manager)?;

    tracing::debug!(path = db_path, pool_size, ?storage, "database pool ready");
    Ok(pool)
}

/// Builds the pool and brings the schema up to date.
///
/// # Errors
///
/// Returns `DbError` if the pool cannot be built or a migration fails.
pub fn open_database(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, DbError> {
    let pool = create_pool(db_path, settings)?;
    let applied = {
        let conn = pool.get()?;
        run_migrations(&conn)?
    };
    if applied > 0 {
        tracing::info!(count = applied, path = db_path, "applied database migrations");
    }
    Ok(pool)
}
