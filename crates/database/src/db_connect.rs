use app_config::{AppConfig, DocumentDbConfig};
use app_error::AppError;
use app_models::{Entity, User};
use std::sync::Arc;

use crate::{Database, service::ConnectionSettings};

fn log_connection_security(db_config: &DocumentDbConfig) {
    tracing::debug!("Connecting to document store: {}", db_config.endpoint);

    if db_config.endpoint.starts_with("wss://") || db_config.endpoint.starts_with("https://") {
        tracing::info!("Using secure TLS connection to database");
    } else if !db_config.is_embedded() {
        tracing::warn!("Using non-secure database connection");
    }
}

/// Unique indexes the user service relies on for duplicate detection.
pub async fn prepare_collections(db: &Database) -> Result<(), AppError> {
    for field in ["username", "email"] {
        db.define_unique_index(User::COLLECTION, field).await?;
    }

    Ok(())
}

pub async fn initialize_db(config: &AppConfig) -> Result<Arc<Database>, AppError> {
    let db_config = &config.database;
    log_connection_security(db_config);

    let max_connections = db_config.pool.size;
    tracing::info!(
        "Initializing database connection pool with {} connections",
        max_connections
    );

    let db = Database::initialize(ConnectionSettings::from_config(db_config), max_connections).await?;
    prepare_collections(&db).await?;

    tracing::info!(
        namespace = %db_config.namespace,
        database = %db_config.database,
        "Successfully connected to document store with connection pool"
    );

    Ok(Arc::new(db))
}

pub async fn initialize_memory_db() -> Result<Arc<Database>, AppError> {
    let db = Database::initialize_memory_db(10, "root", "root").await?;
    prepare_collections(&db).await?;

    tracing::info!("Successfully connected to in-memory SurrealDB with connection pool");

    Ok(Arc::new(db))
}
