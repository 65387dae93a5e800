//! Target store backed by a Postgres-compatible database.

mod columns;
mod encoding;
mod statement;

use std::sync::Arc;

use cdc_config::shared::{IntoConnectOptions, PgConnectionConfig, PoolConfig};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

pub use columns::{ColumnTypeCache, ColumnTypes, load_column_types};
pub use encoding::encode_text;
pub use statement::{Statement, render_statement};

use crate::error::CdcResult;
use crate::mutation::RowMutation;
use crate::store::{StoreTransaction, TargetStore};

/// Applies mutations through a pooled sqlx connection.
#[derive(Debug, Clone)]
pub struct PgTargetStore {
    pool: PgPool,
    column_types: ColumnTypeCache,
}

impl PgTargetStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            column_types: ColumnTypeCache::new(),
        }
    }

    /// Creates a store whose pool opens connections on first use.
    pub fn connect_lazy(connection: &PgConnectionConfig, pool: &PoolConfig) -> Self {
        let pool = pool.to_pool_options().connect_lazy_with(connection.with_db());

        Self::new(pool)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl TargetStore for PgTargetStore {
    async fn begin(&self) -> CdcResult<Box<dyn StoreTransaction>> {
        let transaction = self.pool.begin().await?;

        Ok(Box::new(PgTransaction {
            transaction,
            column_types: self.column_types.clone(),
        }))
    }
}

/// An open transaction on a [`PgTargetStore`].
pub struct PgTransaction {
    transaction: Transaction<'static, Postgres>,
    column_types: ColumnTypeCache,
}

impl PgTransaction {
    /// Returns the column types of the mutation's table, reloading them from the catalog when
    /// the cached entry is missing or does not know every column of the mutation.
    async fn column_types(&mut self, mutation: &RowMutation) -> CdcResult<Arc<ColumnTypes>> {
        let table = mutation.table();
        if let Some(types) = self.column_types.get(table).await
            && types.covers(mutation.columns().iter())
        {
            return Ok(types);
        }

        let types = load_column_types(&mut self.transaction, table).await?;
        debug!(%table, columns = types.len(), "loaded target column types");

        Ok(self.column_types.insert(table.clone(), types).await)
    }
}

#[async_trait::async_trait]
impl StoreTransaction for PgTransaction {
    async fn execute(&mut self, mutation: &RowMutation) -> CdcResult<u64> {
        let types = self.column_types(mutation).await?;
        let statement = render_statement(mutation, &types)?;

        let mut query = sqlx::query(&statement.sql);
        for param in statement.params {
            query = query.bind(param);
        }
        match query.execute(&mut *self.transaction).await {
            Ok(result) => Ok(result.rows_affected()),
            Err(err) => {
                // The table may have been altered since its types were cached.
                self.column_types.invalidate(mutation.table()).await;

                Err(err.into())
            }
        }
    }

    async fn commit(self: Box<Self>) -> CdcResult<()> {
        self.transaction.commit().await?;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CdcResult<()> {
        self.transaction.rollback().await?;

        Ok(())
    }
}
