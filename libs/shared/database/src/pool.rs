use std::str::FromStr;
use std::time::Duration;

use shared_config::DatabaseConfig;
use shared_models::error::DbError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub type DbPool = SqlitePool;

/// Opens the connection pool described by `config`, creating the database file
/// (and its directory) when missing. Foreign keys are enforced on every connection.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, DbError> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbError::Connection(format!("Failed to create database directory: {}", e)))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .idle_timeout(Some(config.idle_timeout))
        .connect_with(options)
        .await?;

    info!(
        "Database pool ready (max {}, min {}, idle timeout {:?})",
        config.max_connections, config.min_connections, config.idle_timeout
    );
    Ok(pool)
}

/// Single-connection in-memory database. The connection is never recycled,
/// since closing it would discard the database.
pub async fn connect_in_memory() -> Result<DbPool, DbError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn ping(pool: &DbPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
