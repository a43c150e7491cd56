//! CLI command implementations

pub mod error;
pub mod harvest;
pub mod status;

pub use error::CliError;
pub use harvest::{Cli, Commands, EnrichArgs, OutputFormat, RangeArgs};
pub use status::{bucket_status, BucketStatus};
