use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use cubes_core::config::DatabaseConfig;
use cubes_core::error::{CubesError, Result};

/// Connection pool for the database being synchronized.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the `[database]` configuration section.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(CubesError::Config("database.url is empty".to_string()));
        }

        let pool = Self::create_pool(&config.url, config.pool_size, config.pool_timeout_secs)
            .await
            .map_err(|e| CubesError::Database(format!("can't connect to db: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create a connection pool with the given parameters.
    async fn create_pool(url: &str, size: u32, timeout_secs: u64) -> sqlx::Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(size)
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(url)
            .await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CubesError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Connecting requires a real PostgreSQL server; only the guard is tested here.

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let result = Database::from_config(&DatabaseConfig::default()).await;
        assert!(matches!(result, Err(CubesError::Config(_))));
    }
}
