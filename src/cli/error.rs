//! CLI error types and conversions

use crate::harvester::HarvestError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Harvest or enrichment stage could not run
    #[error("harvest error: {0}")]
    HarvestError(#[from] HarvestError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
