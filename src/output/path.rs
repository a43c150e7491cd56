//! Artifact path layout
//!
//! All artifacts live under one data directory:
//!
//! ```text
//! {root}/logs/{stem}.log                      link log
//! {root}/results/{stem}.jsonl                 record artifact
//! {root}/crawl_result/{stem}_patch.jsonl      enrichment artifact
//! {root}/crawl_result/{stem}_patch_error.txt  enrichment error ledger
//! ```
//!
//! where `{stem}` is the bucket stem (`2024_1`).
//!
//! # Usage Example
//!
//! ```rust
//! use vuln_harvester::output::ArtifactLayout;
//! use vuln_harvester::TimeBucket;
//! use std::path::PathBuf;
//!
//! let layout = ArtifactLayout::new(PathBuf::from("data"));
//! let paths = layout.for_bucket(&TimeBucket::new(2024, 1).unwrap());
//! assert_eq!(paths.records, PathBuf::from("data/results/2024_1.jsonl"));
//! ```

use super::{OutputError, OutputResult};
use crate::TimeBucket;
use std::path::PathBuf;

/// Default link-log directory name
pub const LINK_LOG_DIR: &str = "logs";
/// Default record directory name
pub const RECORDS_DIR: &str = "results";
/// Default enrichment directory name
pub const ENRICHMENT_DIR: &str = "crawl_result";

/// Directory layout for every bucket's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    link_log_dir: String,
    records_dir: String,
    enrichment_dir: String,
}

impl ArtifactLayout {
    /// Layout rooted at `root` with the default directory names
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            link_log_dir: LINK_LOG_DIR.to_string(),
            records_dir: RECORDS_DIR.to_string(),
            enrichment_dir: ENRICHMENT_DIR.to_string(),
        }
    }

    /// Override the link-log directory name
    pub fn with_link_log_dir(mut self, dir: impl Into<String>) -> Self {
        self.link_log_dir = dir.into();
        self
    }

    /// Override the record directory name
    pub fn with_records_dir(mut self, dir: impl Into<String>) -> Self {
        self.records_dir = dir.into();
        self
    }

    /// Override the enrichment directory name
    pub fn with_enrichment_dir(mut self, dir: impl Into<String>) -> Self {
        self.enrichment_dir = dir.into();
        self
    }

    /// Data directory
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Paths of every artifact for `bucket`
    pub fn for_bucket(&self, bucket: &TimeBucket) -> ArtifactPaths {
        let stem = bucket.stem();
        let enrichment_dir = self.root.join(&self.enrichment_dir);
        ArtifactPaths {
            link_log: self.root.join(&self.link_log_dir).join(format!("{stem}.log")),
            records: self.root.join(&self.records_dir).join(format!("{stem}.jsonl")),
            enrichment: enrichment_dir.join(format!("{stem}_patch.jsonl")),
            error_ledger: enrichment_dir.join(format!("{stem}_patch_error.txt")),
        }
    }

    /// Create every artifact directory
    pub fn ensure_directories(&self) -> OutputResult<()> {
        for dir in [&self.link_log_dir, &self.records_dir, &self.enrichment_dir] {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| {
                OutputError::IoError(format!(
                    "Failed to create directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

/// Artifact paths of one bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// One item location per line, written once per bucket
    pub link_log: PathBuf,
    /// One JSON record per line, append-only
    pub records: PathBuf,
    /// Pretty JSON array of enrichment results
    pub enrichment: PathBuf,
    /// One failing query URL per line
    pub error_ledger: PathBuf,
}
