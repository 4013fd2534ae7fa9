use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::debug;

use fitstore_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens a pool with foreign keys enforced. File databases are created on first use and run in
/// WAL mode. In-memory databases live on a single connection that is never recycled, since each
/// new connection would see an empty database.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.create_if_missing(true).journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { max_connections.max(1) };
    debug!(event_name = "db.pool.connecting", in_memory, max_connections, "opening sqlite pool");

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }
    pool_options.connect_with(options).await
}
