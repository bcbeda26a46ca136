use clap::builder::RangedU64ValueParser;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::loader::DEFAULT_BATCH_SIZE;
use crate::normalize::{DuplicateNames, NormalizerOptions, RoundSelection, UnparsedAmounts};
use crate::schema::SchemaSource;

pub const DEFAULT_SOURCE: &str = "data/indian_startups_funding.csv";

/// How table loads relate to each other transactionally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TransactionMode {
    /// Each table commits on its own; a failed table is rolled back and
    /// reported while later tables are still attempted.
    #[default]
    PerTable,
    /// One outer transaction committed only after all five tables load.
    Single,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "funding-loader")]
#[command(about = "Normalize a startup funding export and load it into a relational store")]
pub struct LoadConfig {
    /// Delimited source file with a header row
    #[arg(long, env = "SOURCE_CSV", default_value = DEFAULT_SOURCE)]
    pub source: PathBuf,

    /// Target database; without it the run only derives and reports
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// DDL script to run before loading (defaults to the bundled migrations)
    #[arg(long, env = "SCHEMA_SQL", conflicts_with = "skip_schema")]
    pub schema: Option<PathBuf>,

    /// Do not create or reset the target tables
    #[arg(long)]
    pub skip_schema: bool,

    #[arg(long, env = "TRANSACTION_MODE", value_enum, default_value_t = TransactionMode::PerTable)]
    pub transaction_mode: TransactionMode,

    /// Round that investor lists are linked to when a startup has several
    #[arg(long, env = "ROUND_SELECTION", value_enum, default_value_t = RoundSelection::First)]
    pub round_selection: RoundSelection,

    /// How rows join to startups whose name has several city/industry rows
    #[arg(long, env = "DUPLICATE_NAMES", value_enum, default_value_t = DuplicateNames::FanOut)]
    pub duplicate_names: DuplicateNames,

    /// Keep or drop rounds whose amount is not a number
    #[arg(long, env = "UNPARSED_AMOUNTS", value_enum, default_value_t = UnparsedAmounts::Keep)]
    pub unparsed_amounts: UnparsedAmounts,

    /// Log each investor name that cannot be resolved
    #[arg(long)]
    pub warn_unresolved_investors: bool,

    /// Rows per INSERT statement
    #[arg(
        long,
        env = "LOAD_BATCH_SIZE",
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub batch_size: usize,

    /// Print the run summary as JSON
    #[arg(long)]
    pub summary_json: bool,
}

impl LoadConfig {
    /// Defaults for everything except the source path; no database.
    pub fn for_source(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            database_url: None,
            schema: None,
            skip_schema: false,
            transaction_mode: TransactionMode::default(),
            round_selection: RoundSelection::default(),
            duplicate_names: DuplicateNames::default(),
            unparsed_amounts: UnparsedAmounts::default(),
            warn_unresolved_investors: false,
            batch_size: DEFAULT_BATCH_SIZE,
            summary_json: false,
        }
    }

    pub fn normalizer_options(&self) -> NormalizerOptions {
        NormalizerOptions {
            round_selection: self.round_selection,
            duplicate_names: self.duplicate_names,
            unparsed_amounts: self.unparsed_amounts,
            warn_unresolved_investors: self.warn_unresolved_investors,
        }
    }

    pub fn schema_source(&self) -> SchemaSource {
        match (&self.schema, self.skip_schema) {
            (_, true) => SchemaSource::Skip,
            (Some(path), false) => SchemaSource::Script(path.clone()),
            (None, false) => SchemaSource::Migrations,
        }
    }
}
