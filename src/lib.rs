//! # Vulnerability Harvester Library
//!
//! A resumable, rate-governed harvester for paginated vulnerability listings.
//! Records are extracted from detail pages, gated by a CWE allow-set, persisted
//! append-only, and later enriched with commit metadata from a REST API.
//!
//! ## Features
//!
//! - **Resilient Fetching**: Rotating client identity, exponential backoff with
//!   jitter on 403/429, linear backoff on transport failures, bounded attempts
//! - **Two-Level Crawl**: Listing pages are walked once per bucket and cached to a
//!   link log; detail pages are processed in discovery order
//! - **Resume Capability**: The last persisted sequence index is the checkpoint;
//!   restarts never re-fetch completed items
//! - **Taxonomy Gate**: Only records carrying an allowed CWE are persisted
//! - **Commit Enrichment**: Commit links are correlated to the GitHub commits API,
//!   with an error ledger for unresolvable queries
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vuln_harvester::TimeBucket;
//! use vuln_harvester::fetcher::{global_http_client, HarvestHttpClient};
//! use vuln_harvester::harvester::{HarvestConfig, HarvestExecutor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarvestConfig::default();
//! let client = HarvestHttpClient::new(
//!     global_http_client(),
//!     config.detail_referer(),
//!     config.retry_policy.clone(),
//! );
//!
//! let executor = HarvestExecutor::new(Arc::new(client), config)?;
//! let report = executor.harvest_bucket(TimeBucket::new(2024, 1)?, None).await?;
//! println!("persisted {} records", report.persisted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - HTTP clients, retry policy and client identity rotation
//! - [`markup`] - Landmark-based extraction interface over HTML documents
//! - [`harvester`] - Listing walker, item extractor, taxonomy filter, the
//!   checkpointed harvest executor and the enrichment correlator
//! - [`output`] - Artifact paths and writers (link log, JSONL records, enrichment)
//! - [`resume`] - Resume cursor and per-artifact locking
//! - [`cli`] - Command-line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// HTTP fetchers and retry policy
pub mod fetcher;

/// Harvest pipeline orchestration
pub mod harvester;

/// Markup extraction interface
pub mod markup;

/// Observability metrics
pub mod metrics;

/// Artifact writers and path layout
pub mod output;

/// Resume cursor and artifact locking
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Earliest year accepted for a bucket
const MIN_YEAR: i32 = 1990;

/// Latest year accepted for a bucket
const MAX_YEAR: i32 = 9999;

/// One (year, month) unit of crawl work
///
/// A bucket namespaces every artifact the pipeline produces: the link log,
/// the record artifact, the enrichment artifact and the error ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucket {
    year: i32,
    month: u32,
}

impl TimeBucket {
    /// Create a bucket, validating the month (1-12) and year range
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        let bucket = Self { year, month };
        bucket.validate()?;
        Ok(bucket)
    }

    /// Bucket for the current UTC month
    pub fn current() -> Self {
        let now = Utc::now();
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    /// Validate bucket integrity
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=12).contains(&self.month) {
            return Err(format!("Month must be 1-12, got {}", self.month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(format!(
                "Year must be between {MIN_YEAR} and {MAX_YEAR}, got {}",
                self.year
            ));
        }
        Ok(())
    }

    /// Year component
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month component (1-12)
    pub fn month(&self) -> u32 {
        self.month
    }

    /// File stem used for every artifact of this bucket (`2024_1`, month unpadded)
    pub fn stem(&self) -> String {
        format!("{}_{}", self.year, self.month)
    }

    /// The following month
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// All buckets from `start` to `end`, both inclusive, in chronological order
    ///
    /// Returns an empty vector when `start` is after `end`.
    pub fn range_inclusive(start: TimeBucket, end: TimeBucket) -> Vec<TimeBucket> {
        let mut buckets = Vec::new();
        let mut current = start;
        while current <= end {
            buckets.push(current);
            current = current.next();
        }
        buckets
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for TimeBucket {
    type Err = String;

    /// Accepts `2024-01`, `2024-1`, `2024/1` and the artifact stem form `2024_1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = s
            .split_once(['-', '_', '/'])
            .ok_or_else(|| format!("Invalid bucket '{s}': expected YYYY-MM"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in bucket '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month in bucket '{s}'"))?;
        TimeBucket::new(year, month)
    }
}

/// An item link discovered on a listing page
///
/// Exists only in memory and, via its location, in the per-bucket link log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReference {
    /// Anchor text as displayed on the listing page
    pub display_text: String,
    /// Site-relative location of the detail page
    pub location: String,
}

/// CVSS base metrics read from the detail page's metric table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvssMetrics {
    /// Attack vector
    #[serde(rename = "AV")]
    pub attack_vector: Option<String>,
    /// Attack complexity
    #[serde(rename = "AC")]
    pub attack_complexity: Option<String>,
    /// Privileges required
    #[serde(rename = "PR")]
    pub privileges_required: Option<String>,
    /// User interaction
    #[serde(rename = "UI")]
    pub user_interaction: Option<String>,
    /// Scope
    #[serde(rename = "S")]
    pub scope: Option<String>,
    /// Confidentiality impact
    #[serde(rename = "C")]
    pub confidentiality: Option<String>,
    /// Integrity impact
    #[serde(rename = "I")]
    pub integrity: Option<String>,
    /// Availability impact
    #[serde(rename = "A")]
    pub availability: Option<String>,
}

/// One harvested vulnerability, persisted as a single JSON line
///
/// Field names on the wire are kept stable so existing record artifacts
/// remain readable as resume checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// Position in the bucket's link log (zero-based resume cursor)
    #[serde(rename = "q_id")]
    pub sequence_index: u64,
    /// Vulnerability identifier, e.g. `CVE-2024-12345`
    #[serde(rename = "cve_id")]
    pub identifier: String,
    /// Affected ecosystem language
    pub language: Option<String>,
    /// Publication date as displayed on the page
    #[serde(rename = "date")]
    pub published_date: Option<String>,
    /// External reference URLs in page order
    #[serde(rename = "resources", default)]
    pub reference_links: Vec<String>,
    /// Classification codes (CWE anchor texts) in page order
    #[serde(rename = "CWEs", default)]
    pub classification_codes: Vec<String>,
    /// Severity score; empty string when the page shows none
    #[serde(rename = "cvss")]
    pub severity_score: Option<String>,
    /// Narrative description
    pub description: Option<String>,
    /// CVSS base metrics
    #[serde(flatten)]
    pub metrics: CvssMetrics,
}

impl VulnerabilityRecord {
    /// Create an empty record for the given link-log position
    pub fn new(sequence_index: u64, identifier: impl Into<String>) -> Self {
        Self {
            sequence_index,
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Whether every field required for persistence is present
    ///
    /// Identifier, language and date must be non-empty, there must be at
    /// least one reference link and one classification code, and a severity
    /// score must be present (an empty score is allowed).
    pub fn is_complete(&self) -> bool {
        !self.identifier.is_empty()
            && self.language.as_deref().is_some_and(|s| !s.is_empty())
            && self.published_date.as_deref().is_some_and(|s| !s.is_empty())
            && !self.reference_links.is_empty()
            && !self.classification_codes.is_empty()
            && self.severity_score.is_some()
    }

    /// Name of the first missing required field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.identifier.is_empty() {
            Some("identifier")
        } else if !self.language.as_deref().is_some_and(|s| !s.is_empty()) {
            Some("language")
        } else if !self.published_date.as_deref().is_some_and(|s| !s.is_empty()) {
            Some("published_date")
        } else if self.reference_links.is_empty() {
            Some("reference_links")
        } else if self.classification_codes.is_empty() {
            Some("classification_codes")
        } else if self.severity_score.is_none() {
            Some("severity_score")
        } else {
            None
        }
    }
}
