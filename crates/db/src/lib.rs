//! Job persistence for the process-execution service.
//!
//! [`JobStore`] is the narrow storage interface the API layer depends on.
//! Two backends implement it: [`SqliteJobStore`] (embedded SQLite via sqlx)
//! and [`MemoryJobStore`] (process-local, for tests and ephemeral servers).

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub mod memory_store;
pub mod models;
pub mod sqlite_store;
pub mod store;

pub use memory_store::MemoryJobStore;
pub use sqlite_store::SqliteJobStore;
pub use store::{JobStore, RetentionPolicy, StoreError, StoreResult};

pub type DbPool = sqlx::SqlitePool;

/// Whether a SQLite URL points at an in-memory database.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Create a connection pool from a database URL.
///
/// In-memory databases are private to a connection, so their pool is pinned
/// to a single connection that is never recycled.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
        SqlitePoolOptions::new().max_connections(8)
    };

    pool_options.connect_with(options).await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
