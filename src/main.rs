use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use funding_loader::error::PipelineError;
use funding_loader::{run_normalize_and_load, LoadConfig, RunSummary};
use sea_orm::{Database, DatabaseConnection};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    // INFO unless RUST_LOG says otherwise
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load .env (if present) before flags so env fallbacks see it
    let _ = dotenv();
    let config = LoadConfig::parse();

    let db_conn: Option<DatabaseConnection> = match config.database_url.as_deref() {
        Some(url) => match Database::connect(url).await {
            Ok(conn) => Some(conn),
            Err(e) => {
                report_failure(&PipelineError::Connection(e));
                return ExitCode::FAILURE;
            }
        },
        None => {
            info!("DATABASE_URL not set; deriving tables without loading");
            None
        }
    };

    let result = run_normalize_and_load(db_conn.as_ref(), &config).await;

    if let Some(conn) = db_conn {
        if let Err(e) = conn.close().await {
            error!(?e, "failed to close database connection");
        }
    }

    match result {
        Ok(summary) => {
            if let Err(e) = print_summary(&summary, config.summary_json) {
                error!("{e:#}");
                return ExitCode::FAILURE;
            }
            let failed = summary.load.as_ref().is_some_and(|l| !l.failed_tables.is_empty());
            if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_failure(err: &PipelineError) {
    match err {
        PipelineError::Connection(details) => {
            eprintln!("\nFATAL ERROR: Could not connect to the database.");
            eprintln!("Please ensure the database server is running and that DATABASE_URL has the right host and credentials.");
            eprintln!("Details: {details}");
        }
        PipelineError::SourceNotFound(path) => {
            eprintln!("ERROR: Source file not found at {}. Check your data folder.", path.display());
        }
        other => eprintln!("\nAn unexpected error occurred: {other}"),
    }
}

fn print_summary(summary: &RunSummary, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let json = serde_json::to_string_pretty(summary).context("serializing run summary")?;
        println!("{json}");
        return Ok(());
    }

    println!("\nSource rows: {}", summary.source_rows);
    println!("  unparseable dates: {}", summary.invalid_dates);
    println!("  unparseable amounts: {}", summary.invalid_amounts);
    println!("  rows without a startup name: {}", summary.report.rows_without_startup);
    println!("  rounds kept without an amount: {}", summary.report.rounds_without_amount);

    let derived = &summary.derived;
    println!("\nDerived:");
    println!("  industries:      {}", derived.industries);
    println!("  investors:       {}", derived.investors);
    println!("  startups:        {}", derived.startups);
    println!("  funding_rounds:  {}", derived.funding_rounds);
    println!("  round_investors: {}", derived.round_investors);

    if !summary.report.ambiguous_startups.is_empty() {
        println!(
            "\nStartups listed with more than one city/industry: {}",
            summary.report.ambiguous_startups.join(", ")
        );
    }

    if let Some(load) = &summary.load {
        for failure in &load.failed_tables {
            println!("\nERROR loading data into {}: {}", failure.table, failure.error);
        }
    }
    if let Some(persisted) = &summary.persisted {
        println!(
            "\nStored: {} industries, {} investors, {} startups, {} funding rounds, {} round investors",
            persisted.industries,
            persisted.investors,
            persisted.startups,
            persisted.funding_rounds,
            persisted.round_investors
        );
    }
    Ok(())
}
