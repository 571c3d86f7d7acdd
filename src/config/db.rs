// src/config/db.rs
// DOCUMENTATION: Database connection pool initialization
// PURPOSE: Setup the PostgreSQL pool, apply the schema and probe the database

use crate::config::Config;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Initialize PostgreSQL connection pool
/// DOCUMENTATION: Creates the pool and applies pending migrations.
/// Called once by main.rs and by the import-dev-data binary
pub async fn init_db_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    log::info!("Initializing database pool");

    let pool = PgPoolOptions::new()
        // Maximum concurrent connections
        .max_connections(config.db_max_connections)
        // Timeout waiting for connection from pool
        .acquire_timeout(Duration::from_secs(config.db_connection_timeout))
        // Connection idle timeout (5 minutes)
        .idle_timeout(Duration::from_secs(300))
        // Connection lifetime (30 minutes before recycle)
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // tours-within and distances depend on it
    let (postgis,): (String,) = sqlx::query_as("SELECT PostGIS_Lib_Version()")
        .fetch_one(&pool)
        .await?;
    log::info!("Database pool initialized (PostGIS {})", postgis);

    Ok(pool)
}

/// Round-trip a trivial query; used by the health endpoint
pub async fn ping(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            log::warn!("Database ping failed: {}", e);
            false
        }
    }
}
