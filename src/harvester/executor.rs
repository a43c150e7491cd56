//! Checkpointed harvest executor
//!
//! Runs stage 1 for one bucket: walk (or reuse) the link log, load the
//! resume cursor from the record artifact, then process every uncovered link
//! in order. Accepted records are appended one synced line at a time, so
//! the cursor stays valid if the process dies between items.

use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::fetcher::PageSource;
use crate::markup::SiteSchema;
use crate::metrics::{record_item_persisted, record_item_skipped};
use crate::output::RecordWriter;
use crate::resume::{ArtifactLock, ResumeCursor};
use crate::shutdown::SharedShutdown;
use crate::{TimeBucket, VulnerabilityRecord};

use super::config::HarvestConfig;
use super::extract::ItemExtractor;
use super::listing::ListingWalker;
use super::progress::ProgressState;
use super::report::HarvestReport;
use super::HarvestError;

/// What happened to one link-log entry
#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemOutcome {
    Persisted,
    Filtered,
    Incomplete,
    Unavailable,
    WriteFailed,
    Interrupted,
}

/// Harvest executor orchestrates stage 1 for a bucket
pub struct HarvestExecutor {
    source: Arc<dyn PageSource>,
    schema: Arc<SiteSchema>,
    config: HarvestConfig,
    shutdown: Option<SharedShutdown>,
}

impl HarvestExecutor {
    /// Create a new executor
    ///
    /// # Errors
    /// Rejects an invalid configuration or an item prefix that does not
    /// produce a valid selector.
    pub fn new(source: Arc<dyn PageSource>, config: HarvestConfig) -> Result<Self, HarvestError> {
        config.validate().map_err(HarvestError::InvalidConfig)?;
        let schema = SiteSchema::with_item_prefix(&config.item_prefix)?;
        Ok(Self {
            source,
            schema: Arc::new(schema),
            config,
            shutdown: None,
        })
    }

    /// Replace the landmark schema
    pub fn with_schema(mut self, schema: SiteSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    /// Run stage 1 for `bucket`
    ///
    /// # Errors
    /// Only for conditions that prevent the bucket from starting: the data
    /// directory cannot be created, the link log or record artifact cannot
    /// be read, or another process holds the bucket's lock. Item-level
    /// failures are counted in the report instead.
    pub async fn harvest_bucket(
        &self,
        bucket: TimeBucket,
        progress: Option<ProgressBar>,
    ) -> Result<HarvestReport, HarvestError> {
        let span = info_span!("harvest", bucket = %bucket);
        self.harvest_bucket_inner(bucket, progress)
            .instrument(span)
            .await
    }

    async fn harvest_bucket_inner(
        &self,
        bucket: TimeBucket,
        progress: Option<ProgressBar>,
    ) -> Result<HarvestReport, HarvestError> {
        let mut report = HarvestReport::new(&bucket);
        let paths = self.config.layout.for_bucket(&bucket);
        self.config.layout.ensure_directories()?;

        let mut lock = ArtifactLock::open(&paths.records)?;
        let _guard = lock.try_exclusive()?;

        let walker = ListingWalker::new(self.source.clone(), self.schema.clone(), self.config.clone())
            .with_shutdown(self.shutdown.clone());
        let Some(links) = walker.ensure_link_log(&bucket, &paths.link_log).await? else {
            report.listing_unavailable = true;
            report.interrupted = self.shutdown_requested();
            return Ok(report);
        };
        report.links = links.len() as u64;

        let mut cursor = ResumeCursor::load(&paths.records)?;
        if cursor.next_index() > 0 {
            info!(next_index = cursor.next_index(), "Skipping items covered by earlier runs");
        }

        let extractor = ItemExtractor::new(
            self.source.clone(),
            self.schema.clone(),
            self.config.site_root.clone(),
            self.config.detail_referer(),
        );
        let mut writer = RecordWriter::new(&paths.records);
        let mut state = ProgressState::new(report.links);

        if let Some(pb) = &progress {
            pb.set_length(report.links);
            pb.set_message(bucket.stem());
        }

        for (index, location) in links.iter().enumerate() {
            let index = index as u64;

            if self.shutdown_requested() {
                warn!(index, "Shutdown requested, stopping before next item");
                report.interrupted = true;
                break;
            }

            if cursor.covers(index) {
                report.skipped_by_cursor += 1;
                self.advance(&progress, &mut state, false);
                continue;
            }

            let outcome = self
                .process_item(&extractor, &mut writer, location, index)
                .await;

            match &outcome {
                ItemOutcome::Persisted => {
                    report.fetched += 1;
                    report.persisted += 1;
                    cursor = cursor.advanced_to(index);
                }
                ItemOutcome::Filtered => {
                    report.fetched += 1;
                    report.filtered += 1;
                }
                ItemOutcome::Incomplete => {
                    report.fetched += 1;
                    report.incomplete += 1;
                }
                ItemOutcome::Unavailable => report.unavailable += 1,
                ItemOutcome::WriteFailed => {
                    report.fetched += 1;
                    report.write_failures += 1;
                }
                ItemOutcome::Interrupted => {
                    report.interrupted = true;
                    break;
                }
            }

            self.advance(&progress, &mut state, outcome == ItemOutcome::Persisted);
        }

        if let Some(pb) = &progress {
            pb.finish_with_message(format!("{} done", bucket.stem()));
        }

        info!(
            links = report.links,
            persisted = report.persisted,
            filtered = report.filtered,
            incomplete = report.incomplete,
            unavailable = report.unavailable,
            skipped_by_cursor = report.skipped_by_cursor,
            last_index = ?cursor.last_persisted(),
            interrupted = report.interrupted,
            "Harvest finished"
        );
        Ok(report)
    }

    async fn process_item(
        &self,
        extractor: &ItemExtractor,
        writer: &mut RecordWriter,
        location: &str,
        index: u64,
    ) -> ItemOutcome {
        let pacing = self.config.pacing;
        if !pacing.item_before.wait(self.shutdown.as_deref()).await {
            return ItemOutcome::Interrupted;
        }

        let record = match extractor.extract(location, index).await {
            Ok(record) => record,
            Err(e) => {
                warn!(index, location = %location, error = %e, "Item unavailable, skipping");
                record_item_skipped("unavailable");
                return ItemOutcome::Unavailable;
            }
        };

        // the item is already fetched; finish it even if shutdown cuts the pause short
        pacing.item_after.wait(self.shutdown.as_deref()).await;

        self.accept(writer, &record)
    }

    fn accept(&self, writer: &mut RecordWriter, record: &VulnerabilityRecord) -> ItemOutcome {
        let index = record.sequence_index;

        if !self.config.filter.passes(record.classification_codes.as_slice()) {
            debug!(index, cve_id = %record.identifier, codes = ?record.classification_codes, "Filtered by CWE allow-set");
            record_item_skipped("filtered");
            return ItemOutcome::Filtered;
        }

        if let Some(field) = record.missing_field() {
            debug!(index, cve_id = %record.identifier, field, "Record incomplete, dropping");
            record_item_skipped("incomplete");
            return ItemOutcome::Incomplete;
        }

        match writer.append(record) {
            Ok(()) => {
                record_item_persisted();
                ItemOutcome::Persisted
            }
            Err(e) => {
                error!(index, cve_id = %record.identifier, error = %e, "Failed to append record");
                record_item_skipped("write_failed");
                ItemOutcome::WriteFailed
            }
        }
    }

    fn advance(&self, progress: &Option<ProgressBar>, state: &mut ProgressState, persisted: bool) {
        state.record(persisted);
        match progress {
            Some(pb) => pb.inc(1),
            None => {
                if state.should_emit_update() {
                    info!("{}", state.format_progress());
                    state.mark_emitted();
                }
            }
        }
    }
}
