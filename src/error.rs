use sea_orm::DbErr;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that can end (or, for table loads, interrupt) a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Could not read source {}: {message}", path.display())]
    SourceParse { path: PathBuf, message: String },

    #[error("Schema execution failed: {0}")]
    SchemaExecution(String),

    #[error("Could not connect to the database: {0}")]
    Connection(#[source] DbErr),

    #[error("Loading table {table} failed: {source}")]
    TableLoad {
        table: &'static str,
        #[source]
        source: LoadError,
    },

    #[error("Load aborted at table {table}, all tables rolled back: {source}")]
    Aborted {
        table: &'static str,
        #[source]
        source: LoadError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Failures local to a single bulk load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("could not build insert statement: {0}")]
    Statement(String),

    #[error("row for {table} has {found} values but {expected} columns were given")]
    ColumnMismatch {
        table: String,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
