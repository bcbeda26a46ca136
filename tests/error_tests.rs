use funding_loader::error::{LoadError, PipelineError};
use sea_orm::DbErr;
use std::path::PathBuf;

// Test for PipelineError Display implementation
#[test]
fn test_pipeline_error_display() {
    let error1 = PipelineError::SourceNotFound(PathBuf::from("data/funding.csv"));
    assert_eq!(error1.to_string(), "Source file not found: data/funding.csv");

    let error2 = PipelineError::SourceParse {
        path: PathBuf::from("data/funding.csv"),
        message: "missing required column(s): date".to_string(),
    };
    assert_eq!(
        error2.to_string(),
        "Could not read source data/funding.csv: missing required column(s): date"
    );

    let error3 = PipelineError::SchemaExecution("syntax error".to_string());
    assert_eq!(error3.to_string(), "Schema execution failed: syntax error");

    let error4 = PipelineError::TableLoad {
        table: "startups",
        source: LoadError::Statement("bad value".to_string()),
    };
    assert_eq!(
        error4.to_string(),
        "Loading table startups failed: could not build insert statement: bad value"
    );

    let error5 = PipelineError::Connection(DbErr::Custom("refused".to_string()));
    assert!(error5.to_string().starts_with("Could not connect to the database"));
}

#[test]
fn test_load_error_display() {
    let error = LoadError::ColumnMismatch {
        table: "industries".to_string(),
        expected: 2,
        found: 3,
    };
    assert_eq!(
        error.to_string(),
        "row for industries has 3 values but 2 columns were given"
    );
}

#[test]
fn test_aborted_display_names_table_and_cause() {
    let error = PipelineError::Aborted {
        table: "investors",
        source: LoadError::Statement("boom".to_string()),
    };
    assert_eq!(
        error.to_string(),
        "Load aborted at table investors, all tables rolled back: could not build insert statement: boom"
    );
}
