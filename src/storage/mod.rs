//! Storage implementations.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::interfaces::RegistrantStore;

pub mod mock;

#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub mod schema;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub mod sql;

#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub use sql::SqlRegistrantStore;

#[cfg(feature = "postgres")]
pub use sql::postgres::PostgresRegistrantStore;
#[cfg(feature = "sqlite")]
pub use sql::sqlite::SqliteRegistrantStore;

/// Initialize storage based on configuration.
///
/// Connects to the configured backend, creates the schema if missing, and
/// returns the store behind the trait object the engine consumes.
pub async fn init_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn RegistrantStore>, Box<dyn std::error::Error + Send + Sync>> {
    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);

            let pool = if config.sqlite.path == ":memory:" {
                // Every pooled connection gets its own in-memory database, so
                // cap the pool at one connection to keep a single database.
                sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect("sqlite::memory:")
                    .await?
            } else {
                if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.sqlite.path))
                    .await?
            };

            let store = Arc::new(SqliteRegistrantStore::new(pool));
            store.init().await?;
            Ok(store)
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("sqlite feature not enabled".into())
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            info!("Storage: postgres at {}", config.postgres.uri);

            let pool = sqlx::PgPool::connect(&config.postgres.uri).await?;
            let store = Arc::new(PostgresRegistrantStore::new(pool));
            store.init().await?;
            Ok(store)
        }
        #[cfg(not(feature = "postgres"))]
        StorageType::Postgres => {
            error!("PostgreSQL storage requested but 'postgres' feature is not enabled");
            Err("postgres feature not enabled".into())
        }
    }
}
