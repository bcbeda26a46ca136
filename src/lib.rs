//! Normalizes a denormalized startup-funding export into industries,
//! investors, startups, funding rounds and a round/investor junction, and
//! loads them into a relational store.

pub mod config;
pub mod entities;
pub mod error;
pub mod jobs;
pub mod loader;
pub mod normalize;
pub mod schema;
pub mod source;

pub use config::{LoadConfig, TransactionMode};
pub use error::{LoadError, PipelineError};
pub use jobs::{run_normalize_and_load, RunSummary};
pub use normalize::{
    DuplicateNames, Normalized, Normalizer, NormalizerOptions, RoundSelection, UnparsedAmounts,
};
