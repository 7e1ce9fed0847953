//! Pool construction for the SQLite store.

use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::fs;
use tracing::debug;

use parley_config::DatabaseConfig;

use crate::errors::{StoreError, StoreResult};

/// Open a connection pool for the configured database, creating the SQLite
/// file (and its parent directory) if it does not exist yet.
pub async fn prepare_database(config: &DatabaseConfig) -> StoreResult<SqlitePool> {
    if let Some(sqlite_path) = config.url.strip_prefix("sqlite://") {
        if sqlite_path != ":memory:" {
            let path = Path::new(sqlite_path);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await.map_err(|e| {
                        StoreError::Connection(format!(
                            "failed to create sqlite directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }

            if !path.exists() {
                fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .open(path)
                    .await
                    .map_err(|e| {
                        StoreError::Connection(format!(
                            "failed to create sqlite database file {}: {e}",
                            path.display()
                        ))
                    })?;
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| StoreError::Connection(format!("failed to connect to {}: {e}", config.url)))?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    debug!(url = %config.url, "database pool ready");
    Ok(pool)
}
