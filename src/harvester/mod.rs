//! Harvest pipeline orchestration
//!
//! # Overview
//!
//! Stage 1 ([`executor::HarvestExecutor`]) runs once per bucket:
//!
//! 1. **Walk**: [`listing::ListingWalker`] discovers every item link across the
//!    bucket's listing pages and caches them in the link log
//! 2. **Resume**: the record artifact's last sequence index becomes the cursor
//! 3. **Extract**: [`extract::ItemExtractor`] fetches each remaining item and
//!    maps its landmarks into a [`crate::VulnerabilityRecord`]
//! 4. **Gate**: [`filter::TaxonomyFilter`] and the completeness check decide
//!    whether the record is appended
//!
//! Stage 2 ([`enrich::EnrichmentCorrelator`]) later reads the persisted
//! records, turns commit links into API queries and writes the enrichment
//! artifact and error ledger.
//!
//! # Error Handling
//!
//! Per-item and per-query failures are logged, counted in the stage report
//! and skipped. [`HarvestError`] is reserved for conditions that stop a
//! bucket from starting: an unwritable data directory, an unreadable
//! checkpoint, or another process holding the bucket's lock.

pub mod config;
pub mod enrich;
pub mod executor;
pub mod extract;
pub mod filter;
pub mod listing;
pub mod pacing;
pub mod progress;
pub mod report;

pub use config::{EnrichmentConfig, HarvestConfig};
pub use enrich::{CommitEnrichment, EnrichmentCorrelator};
pub use executor::HarvestExecutor;
pub use extract::ItemExtractor;
pub use filter::TaxonomyFilter;
pub use listing::ListingWalker;
pub use pacing::{DelayWindow, Pacing};
pub use report::{EnrichmentReport, HarvestReport};

use crate::markup::MarkupError;
use crate::output::OutputError;
use crate::resume::ResumeError;

/// Harvest errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Artifact could not be written or read
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Checkpoint or lock failure
    #[error("resume error: {0}")]
    Resume(#[from] ResumeError),

    /// Site schema is invalid
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),

    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
