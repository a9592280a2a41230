use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use cubes_core::config::SyncConfig;
use cubes_core::error::{CubesError, Result};
use cubes_core::schema::{Migration, MigrationId};

use super::ddl::quote_ident;
use super::target::{SyncTarget, SyncTransaction};

/// PostgreSQL target reached through a connection pool.
#[derive(Clone)]
pub struct PgTarget {
    pool: PgPool,
    bookkeeping_table: String,
}

impl PgTarget {
    pub fn new(pool: PgPool, config: &SyncConfig) -> Self {
        Self {
            pool,
            bookkeeping_table: config.bookkeeping_table.clone(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SyncTarget for PgTarget {
    fn begin(&self) -> BoxFuture<'_, Result<Box<dyn SyncTransaction>>> {
        Box::pin(async move {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| CubesError::Database(format!("can't start transaction: {}", e)))?;
            debug!("Transaction started");

            Ok(Box::new(PgTransaction {
                tx,
                table: quote_ident(&self.bookkeeping_table),
            }) as Box<dyn SyncTransaction>)
        })
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    /// Quoted bookkeeping table name.
    table: String,
}

impl SyncTransaction for PgTransaction {
    fn ensure_bookkeeping(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id varchar(255) NOT NULL,
                    data text NOT NULL,
                    PRIMARY KEY (id)
                )",
                self.table
            );
            sqlx::query(&sql)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| CubesError::Database(format!("can't add migration table: {}", e)))?;
            Ok(())
        })
    }

    fn read_marker(&mut self) -> BoxFuture<'_, Result<Option<MigrationId>>> {
        Box::pin(async move {
            let sql = format!("SELECT id FROM {} ORDER BY id DESC LIMIT 1", self.table);
            let id: Option<String> = sqlx::query_scalar(&sql)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| {
                    CubesError::Database(format!("can't read current migration state: {}", e))
                })?;
            Ok(id.map(MigrationId::new))
        })
    }

    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            sqlx::query(statement).execute(&mut *self.tx).await?;
            Ok(())
        })
    }

    fn record_migration<'a>(&'a mut self, migration: &'a Migration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let data = migration.to_compact_json()?;
            let sql = format!("INSERT INTO {} (id, data) VALUES ($1, $2)", self.table);
            sqlx::query(&sql)
                .bind(migration.id.as_str())
                .bind(data)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    CubesError::Database(format!(
                        "can't add migration {} to migrations table: {}",
                        migration.id, e
                    ))
                })?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        let PgTransaction { tx, .. } = *self;
        Box::pin(async move {
            tx.commit()
                .await
                .map_err(|e| CubesError::Database(format!("can't commit: {}", e)))
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
        let PgTransaction { tx, .. } = *self;
        Box::pin(async move {
            tx.rollback()
                .await
                .map_err(|e| CubesError::Database(format!("can't roll back: {}", e)))
        })
    }
}
