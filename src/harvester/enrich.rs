//! Enrichment correlator
//!
//! Stage 2 for one bucket: read the persisted records, turn every GitHub
//! commit link into a commits API query, and collect commit metadata. The
//! enrichment artifact and the error ledger are written however the loop
//! ends, including an unwind, so an interrupted run still leaves a valid
//! pair of artifacts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::fetcher::CommitSource;
use crate::metrics::record_enrichment_query;
use crate::output::{read_records, write_enrichment_artifact, write_error_ledger, OutputResult};
use crate::resume::ArtifactLock;
use crate::shutdown::SharedShutdown;
use crate::{TimeBucket, VulnerabilityRecord};

use super::config::EnrichmentConfig;
use super::report::EnrichmentReport;
use super::HarvestError;

static COMMIT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s]+)/(?:pull/\d+/)?commits?/([0-9a-fA-F]{7,40})",
    )
    .expect("valid commit link regex")
});

/// Commits API query for a reference link, if it is a GitHub commit link
///
/// `https://github.com/{owner}/{repo}/commit/{sha}` (also the pull-request
/// form `.../pull/{n}/commits/{sha}`) becomes
/// `{api_base}/repos/{owner}/{repo}/commits/{sha}`.
pub fn derive_query(link: &str, api_base: &str) -> Option<String> {
    let caps = COMMIT_LINK.captures(link.trim())?;
    Some(format!(
        "{}/repos/{}/{}/commits/{}",
        api_base.trim_end_matches('/'),
        &caps[1],
        &caps[2],
        &caps[3]
    ))
}

/// Ordered queries over all records: record order, then link order
///
/// Duplicates are kept so the ledger mirrors what was actually queried.
pub fn derive_queries(records: &[VulnerabilityRecord], api_base: &str) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| record.reference_links.iter())
        .filter_map(|link| derive_query(link, api_base))
        .collect()
}

/// Commit metadata for one successful query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitEnrichment {
    /// API URL of the commit
    pub url: String,
    /// Browser URL of the commit
    pub html_url: String,
    /// Commit message
    pub message: String,
    /// Changed files as returned by the API
    pub files: Value,
    /// Commit SHA
    pub commit_id: String,
    /// Committer date
    pub commit_date: String,
}

impl CommitEnrichment {
    /// Build from a commits API response
    ///
    /// # Errors
    /// Names the first required key that is absent or of the wrong type.
    pub fn from_response(data: &Value) -> Result<Self, &'static str> {
        for key in ["url", "html_url", "commit", "files"] {
            if data.get(key).map_or(true, Value::is_null) {
                return Err(key);
            }
        }

        let text = |value: Option<&Value>, name: &'static str| -> Result<String, &'static str> {
            value
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(name)
        };

        let commit = &data["commit"];
        Ok(Self {
            url: text(data.get("url"), "url")?,
            html_url: text(data.get("html_url"), "html_url")?,
            message: text(commit.get("message"), "commit.message")?,
            files: data["files"].clone(),
            commit_id: text(data.get("sha"), "sha")?,
            commit_date: text(
                commit.get("committer").and_then(|c| c.get("date")),
                "commit.committer.date",
            )?,
        })
    }
}

/// Results accumulated by one run, written on finish or on drop
struct PendingArtifacts {
    enrichment: PathBuf,
    error_ledger: PathBuf,
    results: Vec<CommitEnrichment>,
    errors: Vec<String>,
    written: bool,
}

impl PendingArtifacts {
    fn new(enrichment: PathBuf, error_ledger: PathBuf) -> Self {
        Self {
            enrichment,
            error_ledger,
            results: Vec::new(),
            errors: Vec::new(),
            written: false,
        }
    }

    fn write(&mut self) -> OutputResult<()> {
        self.written = true;
        let artifact = write_enrichment_artifact(&self.enrichment, &self.results);
        let ledger = write_error_ledger(&self.error_ledger, &self.errors);
        artifact.and(ledger)
    }

    fn finish(mut self) -> OutputResult<()> {
        self.write()
    }
}

impl Drop for PendingArtifacts {
    fn drop(&mut self) {
        if self.written {
            return;
        }
        warn!(
            results = self.results.len(),
            errors = self.errors.len(),
            "Enrichment loop ended abnormally, writing partial artifacts"
        );
        if let Err(e) = self.write() {
            error!(error = %e, "Failed to write enrichment artifacts");
        }
    }
}

/// Correlates persisted records with commit metadata
pub struct EnrichmentCorrelator {
    source: Arc<dyn CommitSource>,
    config: EnrichmentConfig,
    shutdown: Option<SharedShutdown>,
}

impl EnrichmentCorrelator {
    /// Create a correlator
    pub fn new(source: Arc<dyn CommitSource>, config: EnrichmentConfig) -> Self {
        Self {
            source,
            config,
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run stage 2 for `bucket`
    ///
    /// Returns `Ok(None)` without touching anything when the bucket has no
    /// record artifact.
    ///
    /// # Errors
    /// Only when the bucket cannot start (lock held, record artifact
    /// unreadable) or the final artifacts cannot be written. Query failures
    /// go to the error ledger.
    pub async fn enrich_bucket(
        &self,
        bucket: TimeBucket,
    ) -> Result<Option<EnrichmentReport>, HarvestError> {
        let span = info_span!("enrich", bucket = %bucket);
        self.enrich_bucket_inner(bucket).instrument(span).await
    }

    async fn enrich_bucket_inner(
        &self,
        bucket: TimeBucket,
    ) -> Result<Option<EnrichmentReport>, HarvestError> {
        let paths = self.config.layout.for_bucket(&bucket);
        if !paths.records.exists() {
            info!("No record artifact, nothing to enrich");
            return Ok(None);
        }

        let mut lock = ArtifactLock::open(&paths.enrichment)?;
        let _guard = lock.try_exclusive()?;

        let records = read_records(&paths.records)?;
        let queries = derive_queries(&records, &self.config.api_base);

        let mut report = EnrichmentReport::new(&bucket);
        report.records = records.len() as u64;
        report.queries = queries.len() as u64;
        info!(records = report.records, queries = report.queries, "Starting enrichment");

        let mut pending = PendingArtifacts::new(paths.enrichment, paths.error_ledger);

        for query in queries {
            if self
                .shutdown
                .as_ref()
                .is_some_and(|s| s.is_shutdown_requested())
            {
                warn!("Shutdown requested, stopping before next query");
                report.interrupted = true;
                break;
            }

            match self.source.fetch_commit(&query).await {
                Ok(data) => match CommitEnrichment::from_response(&data) {
                    Ok(result) => {
                        record_enrichment_query("succeeded");
                        pending.results.push(result);
                    }
                    Err(missing) => {
                        warn!(url = %query, missing, "data is null, query recorded in error ledger");
                        record_enrichment_query("invalid");
                        pending.errors.push(query);
                    }
                },
                Err(e) => {
                    warn!(url = %query, error = %e, "Commit query failed, recorded in error ledger");
                    record_enrichment_query("failed");
                    pending.errors.push(query);
                }
            }

            if !self.config.delay.wait(self.shutdown.as_deref()).await {
                report.interrupted = true;
                break;
            }
        }

        report.succeeded = pending.results.len() as u64;
        report.failed = pending.errors.len() as u64;
        pending.finish()?;

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            interrupted = report.interrupted,
            "Enrichment finished"
        );
        Ok(Some(report))
    }
}
