//! Embedded database migrations.

use sqlx::SqlitePool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Run all pending migrations.
pub async fn run_migrations(pool: &SqlitePool) -> crate::errors::StoreResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| crate::errors::StoreError::Migration(e.to_string()))?;
    info!("database migrations applied");
    Ok(())
}
