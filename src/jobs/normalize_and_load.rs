// normalize_and_load.rs – read the flat funding export, derive the five
// relational tables and load them in foreign-key order.
//
// Load order: industries → investors → startups → funding_rounds →
// round_investors. Surrogate ids are assigned during derivation and written
// as-is, so every table relies on the tables before it being persisted.

use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect, TransactionTrait};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{LoadConfig, TransactionMode};
use crate::entities;
use crate::error::{LoadError, PipelineError, Result};
use crate::loader::{load_table, BulkLoader, SqlBulkLoader, TableRows};
use crate::normalize::{DerivationReport, Normalized, Normalizer, TableCounts};
use crate::schema;
use crate::source;

/// A table whose load failed without stopping the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub table: &'static str,
    pub error: String,
}

/// Rows loaded per table, plus the tables that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub loaded: TableCounts,
    pub failed_tables: Vec<TableFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub source_rows: usize,
    pub invalid_dates: usize,
    pub invalid_amounts: usize,
    pub derived: TableCounts,
    pub report: DerivationReport,
    /// `None` when the run had no database.
    pub load: Option<LoadOutcome>,
    /// Row counts read back from the store after loading.
    pub persisted: Option<TableCounts>,
}

/// Runs the whole job. Without a connection the entities are derived and
/// summarised but nothing is written.
pub async fn run_normalize_and_load(
    conn: Option<&DatabaseConnection>,
    config: &LoadConfig,
) -> Result<RunSummary> {
    let table = source::read_source(&config.source)?;
    let normalized = Normalizer::new(config.normalizer_options()).normalize(&table);

    let mut summary = RunSummary {
        source_rows: table.len(),
        invalid_dates: table.invalid_dates,
        invalid_amounts: table.invalid_amounts,
        derived: normalized.summary(),
        report: normalized.report.clone(),
        load: None,
        persisted: None,
    };

    let Some(db) = conn else {
        info!("No database connection; derived entities were not loaded");
        return Ok(summary);
    };

    schema::apply_schema(db, &config.schema_source()).await?;

    let span = info_span!("load", mode = ?config.transaction_mode);
    let outcome = match config.transaction_mode {
        TransactionMode::PerTable => {
            let loader = SqlBulkLoader::new(db).with_batch_size(config.batch_size);
            load_normalized(&loader, normalized, false)
                .instrument(span)
                .await?
        }
        TransactionMode::Single => load_in_single_transaction(db, config, normalized)
            .instrument(span)
            .await?,
    };

    if !outcome.failed_tables.is_empty() {
        warn!(
            failed = outcome.failed_tables.len(),
            "Some tables failed to load; later tables may reference missing rows"
        );
    }
    summary.load = Some(outcome);
    summary.persisted = Some(table_counts(db).await?);

    info!("Data loading complete");
    Ok(summary)
}

async fn load_in_single_transaction(
    db: &DatabaseConnection,
    config: &LoadConfig,
    normalized: Normalized,
) -> Result<LoadOutcome> {
    let txn = db.begin().await?;
    let result = {
        let loader = SqlBulkLoader::new(&txn).with_batch_size(config.batch_size);
        load_normalized(&loader, normalized, true).await
    };

    match result {
        Ok(outcome) => {
            txn.commit().await?;
            info!("Committed all tables");
            Ok(outcome)
        }
        Err(PipelineError::TableLoad { table, source }) => {
            txn.rollback().await?;
            Err(PipelineError::Aborted { table, source })
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

/// Loads every derived table in dependency order.
///
/// With `fail_fast` the first table failure is returned as
/// [`PipelineError::TableLoad`]; otherwise it is logged, recorded in the
/// outcome and the remaining tables are still attempted.
pub async fn load_normalized<L>(
    loader: &L,
    normalized: Normalized,
    fail_fast: bool,
) -> Result<LoadOutcome>
where
    L: BulkLoader + ?Sized,
{
    let Normalized {
        industries,
        investors,
        startups,
        funding_rounds,
        round_investors,
        ..
    } = normalized;

    let mut outcome = LoadOutcome::default();
    outcome.loaded.industries = load_step(loader, industries, fail_fast, &mut outcome).await?;
    outcome.loaded.investors = load_step(loader, investors, fail_fast, &mut outcome).await?;
    outcome.loaded.startups = load_step(loader, startups, fail_fast, &mut outcome).await?;
    outcome.loaded.funding_rounds =
        load_step(loader, funding_rounds, fail_fast, &mut outcome).await?;

    if round_investors.is_empty() {
        info!("No data for round_investors table");
    } else {
        outcome.loaded.round_investors =
            load_step(loader, round_investors, fail_fast, &mut outcome).await?;
    }

    Ok(outcome)
}

async fn load_step<L, T>(
    loader: &L,
    rows: Vec<T>,
    fail_fast: bool,
    outcome: &mut LoadOutcome,
) -> Result<u64>
where
    L: BulkLoader + ?Sized,
    T: TableRows,
{
    match load_table(loader, rows).await {
        Ok(loaded) => Ok(loaded),
        Err(source) => table_failure(T::TABLE, source, fail_fast, outcome).map(|()| 0),
    }
}

fn table_failure(
    table: &'static str,
    source: LoadError,
    fail_fast: bool,
    outcome: &mut LoadOutcome,
) -> Result<()> {
    error!(table, error = %source, "ERROR loading table");
    if fail_fast {
        return Err(PipelineError::TableLoad { table, source });
    }
    outcome.failed_tables.push(TableFailure {
        table,
        error: source.to_string(),
    });
    Ok(())
}

/// Counts the rows currently stored in each target table.
///
/// Only key columns are selected so the count works against any schema
/// that carries them.
pub async fn table_counts(db: &DatabaseConnection) -> Result<TableCounts> {
    use crate::entities::{funding_round, industry, investor, round_investor, startup};

    Ok(TableCounts {
        industries: entities::Industry::find()
            .select_only()
            .column(industry::Column::IndustryId)
            .count(db)
            .await?,
        investors: entities::Investor::find()
            .select_only()
            .column(investor::Column::InvestorId)
            .count(db)
            .await?,
        startups: entities::Startup::find()
            .select_only()
            .column(startup::Column::StartupId)
            .count(db)
            .await?,
        funding_rounds: entities::FundingRound::find()
            .select_only()
            .column(funding_round::Column::RoundId)
            .count(db)
            .await?,
        round_investors: entities::RoundInvestor::find()
            .select_only()
            .column(round_investor::Column::RoundId)
            .count(db)
            .await?,
    })
}
