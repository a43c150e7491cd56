//! Per-bucket stage reports

use serde::Serialize;

use crate::TimeBucket;

/// Outcome of stage 1 for one bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    /// Bucket stem
    pub bucket: String,
    /// Whether the listing could not be walked (page 1 unavailable)
    pub listing_unavailable: bool,
    /// Entries in the link log
    pub links: u64,
    /// Entries skipped because an earlier run covered them
    pub skipped_by_cursor: u64,
    /// Detail pages fetched
    pub fetched: u64,
    /// Records appended
    pub persisted: u64,
    /// Records rejected by the CWE allow-set
    pub filtered: u64,
    /// Records missing a required field
    pub incomplete: u64,
    /// Items whose detail page stayed unavailable after retries
    pub unavailable: u64,
    /// Records that could not be appended
    pub write_failures: u64,
    /// Whether a shutdown request stopped the bucket early
    pub interrupted: bool,
}

impl HarvestReport {
    /// Empty report for `bucket`
    pub fn new(bucket: &TimeBucket) -> Self {
        Self {
            bucket: bucket.stem(),
            ..Self::default()
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        if self.listing_unavailable {
            return format!("{}: listing unavailable, bucket skipped", self.bucket);
        }
        let mut line = format!(
            "{}: {} links, {} persisted, {} filtered, {} incomplete, {} unavailable, {} already done",
            self.bucket,
            self.links,
            self.persisted,
            self.filtered,
            self.incomplete,
            self.unavailable,
            self.skipped_by_cursor
        );
        if self.write_failures > 0 {
            line.push_str(&format!(", {} write failures", self.write_failures));
        }
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        line
    }
}

/// Outcome of stage 2 for one bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Bucket stem
    pub bucket: String,
    /// Records read from the record artifact
    pub records: u64,
    /// Queries derived from commit links
    pub queries: u64,
    /// Queries that produced a result
    pub succeeded: u64,
    /// Queries recorded in the error ledger
    pub failed: u64,
    /// Whether a shutdown request stopped the run early
    pub interrupted: bool,
}

impl EnrichmentReport {
    /// Empty report for `bucket`
    pub fn new(bucket: &TimeBucket) -> Self {
        Self {
            bucket: bucket.stem(),
            ..Self::default()
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {} records, {} queries, {} enriched, {} failed",
            self.bucket, self.records, self.queries, self.succeeded, self.failed
        );
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        line
    }
}
