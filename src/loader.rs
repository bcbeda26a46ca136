//! Bulk loading of derived rows into the target store.

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait, Value};
use tracing::{debug, error, info};

use crate::error::LoadError;
use crate::normalize::{FundingRound, Industry, Investor, RoundInvestor, Startup};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// One row of column values, in the order of the column list it is loaded with.
pub type Row = Vec<Value>;

/// Persists rows into one table.
///
/// Implementations must leave nothing of a failed call behind: either every
/// row is committed or the table's pending work is rolled back.
#[async_trait]
pub trait BulkLoader: Send + Sync {
    async fn load(&self, table: &str, columns: &[&str], rows: Vec<Row>) -> Result<u64, LoadError>;
}

/// A derived entity that maps onto one target table.
pub trait TableRows {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn into_row(self) -> Row;
}

impl TableRows for Industry {
    const TABLE: &'static str = "industries";
    const COLUMNS: &'static [&'static str] = &["industry_id", "name"];

    fn into_row(self) -> Row {
        vec![self.industry_id.into(), self.name.into()]
    }
}

impl TableRows for Investor {
    const TABLE: &'static str = "investors";
    const COLUMNS: &'static [&'static str] = &["investor_id", "name"];

    fn into_row(self) -> Row {
        vec![self.investor_id.into(), self.name.into()]
    }
}

impl TableRows for Startup {
    const TABLE: &'static str = "startups";
    const COLUMNS: &'static [&'static str] = &["startup_id", "name", "city", "industry_id"];

    fn into_row(self) -> Row {
        vec![
            self.startup_id.into(),
            self.name.into(),
            self.city.into(),
            self.industry_id.into(),
        ]
    }
}

impl TableRows for FundingRound {
    const TABLE: &'static str = "funding_rounds";
    const COLUMNS: &'static [&'static str] =
        &["round_id", "startup_id", "date", "round_type", "amount_usd"];

    fn into_row(self) -> Row {
        vec![
            self.round_id.into(),
            self.startup_id.into(),
            self.date.into(),
            self.round_type.into(),
            self.amount_usd.into(),
        ]
    }
}

impl TableRows for RoundInvestor {
    const TABLE: &'static str = "round_investors";
    const COLUMNS: &'static [&'static str] = &["round_id", "investor_id"];

    fn into_row(self) -> Row {
        vec![self.round_id.into(), self.investor_id.into()]
    }
}

/// Loads typed entities through any [`BulkLoader`].
pub async fn load_table<L, T>(loader: &L, rows: Vec<T>) -> Result<u64, LoadError>
where
    L: BulkLoader + ?Sized,
    T: TableRows,
{
    let rows = rows.into_iter().map(TableRows::into_row).collect();
    loader.load(T::TABLE, T::COLUMNS, rows).await
}

/// [`BulkLoader`] over a sea-orm connection or transaction.
///
/// Each `load` call runs in its own transaction; when `conn` is itself a
/// transaction that becomes a savepoint, so a failed table never disturbs
/// work done before it.
pub struct SqlBulkLoader<'c, C> {
    conn: &'c C,
    batch_size: usize,
}

impl<'c, C> SqlBulkLoader<'c, C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn insert_batches(
        &self,
        txn: &DatabaseTransaction,
        table: &str,
        columns: &[&str],
        rows: Vec<Row>,
    ) -> Result<u64, LoadError> {
        let backend = txn.get_database_backend();
        let mut loaded = 0;

        for (batch_no, batch) in rows.chunks(self.batch_size).enumerate() {
            let statement = {
                let mut insert = Query::insert();
                insert
                    .into_table(Alias::new(table))
                    .columns(columns.iter().map(|c| Alias::new(*c)));
                for row in batch {
                    insert
                        .values(row.iter().cloned().map(SimpleExpr::from))
                        .map_err(|e| LoadError::Statement(e.to_string()))?;
                }
                backend.build(&insert)
            };

            let result = txn.execute(statement).await?;
            debug!(table, batch = batch_no, rows = result.rows_affected(), "Inserted batch");
            loaded += result.rows_affected();
        }

        Ok(loaded)
    }
}

#[async_trait]
impl<'c, C> BulkLoader for SqlBulkLoader<'c, C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    async fn load(&self, table: &str, columns: &[&str], rows: Vec<Row>) -> Result<u64, LoadError> {
        if rows.is_empty() {
            info!(table, "Skipping empty table");
            return Ok(0);
        }
        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(LoadError::ColumnMismatch {
                table: table.to_string(),
                expected: columns.len(),
                found: row.len(),
            });
        }

        let txn = self.conn.begin().await?;
        match self.insert_batches(&txn, table, columns, rows).await {
            Ok(loaded) => {
                txn.commit().await?;
                info!(table, rows = loaded, "Loaded rows");
                Ok(loaded)
            }
            Err(e) => {
                error!(table, error = %e, "Load failed; rolling back table");
                txn.rollback().await?;
                Err(e)
            }
        }
    }
}
