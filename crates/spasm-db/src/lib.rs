//! Database layer for the Spasm event API.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations for the event tables. Queries themselves live
//! in `spasm-store`.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_database, DbError, DbPool, DbRuntimeSettings};
