use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

use crate::error::{PipelineError, Result};

/// Where the target schema comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A DDL script run once, in full, inside one transaction.
    Script(PathBuf),
    /// The bundled migrations, refreshed (dropped and re-applied).
    Migrations,
    /// Leave the schema alone.
    Skip,
}

/// Prepares the five target tables. Any failure rolls back the script's
/// effects and is fatal to the run.
pub async fn apply_schema(db: &DatabaseConnection, source: &SchemaSource) -> Result<()> {
    match source {
        SchemaSource::Script(path) => {
            let script = fs::read_to_string(path).map_err(|e| {
                PipelineError::SchemaExecution(format!("reading {}: {}", path.display(), e))
            })?;
            execute_script(db, &script).await?;
            info!(path = %path.display(), "Executed schema script");
        }
        SchemaSource::Migrations => {
            Migrator::refresh(db)
                .await
                .map_err(|e| PipelineError::SchemaExecution(e.to_string()))?;
            info!("Refreshed schema migrations");
        }
        SchemaSource::Skip => info!("Schema step skipped"),
    }
    Ok(())
}

/// Runs a multi-statement DDL script atomically.
pub async fn execute_script(db: &DatabaseConnection, script: &str) -> Result<()> {
    let txn = db.begin().await?;
    if let Err(e) = txn.execute_unprepared(script).await {
        error!(error = %e, "Schema script failed; rolling back");
        txn.rollback().await?;
        return Err(PipelineError::SchemaExecution(e.to_string()));
    }
    txn.commit()
        .await
        .map_err(|e| PipelineError::SchemaExecution(e.to_string()))
}
