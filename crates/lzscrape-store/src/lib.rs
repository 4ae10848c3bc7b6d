pub mod backup;
pub mod guard;
pub mod memory;
pub mod pg;
pub mod sink;
pub mod warehouse;

use std::str::FromStr;
use std::time::Duration;

use lzscrape_core::AppConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use thiserror::Error;

pub use backup::BackupWriter;
pub use guard::{DuplicateGuard, GuardDecision, PreparedBatch};
pub use memory::MemoryWarehouse;
pub use pg::PgWarehouse;
pub use sink::{PersistenceSink, SinkReport};
pub use warehouse::{CountryHistory, StoredKey, Warehouse};

// Path relative to crates/lzscrape-store/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backup write to {path} failed: {source}")]
    BackupWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("warehouse upload failed: {reason}")]
    WarehouseUpload { reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

/// Connect to the warehouse. When `schema` is given it becomes the session
/// `search_path`, so the `products` table and migrations live there.
///
/// # Errors
///
/// Returns [`StoreError::Sqlx`] if the URL is malformed or the connection
/// cannot be established.
pub async fn connect_pool(
    database_url: &str,
    schema: Option<&str>,
    config: PoolConfig,
) -> Result<PgPool, StoreError> {
    let mut options = PgConnectOptions::from_str(database_url)?;
    if let Some(schema) = schema {
        options = options.options([("search_path", schema)]);
    }
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run all pending migrations against the pool.
///
/// # Errors
///
/// Returns [`StoreError::Migration`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
