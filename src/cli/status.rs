//! Status command: read-only view of each bucket's artifacts

use crate::output::{
    last_sequence_index, read_enrichment_results, read_error_ledger, read_link_log, read_records,
    ArtifactLayout,
};
use crate::TimeBucket;
use serde::Serialize;

use super::harvest::{print_json, Cli, OutputFormat, RangeArgs};
use super::CliError;

/// Artifact state of one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketStatus {
    /// Bucket stem
    pub bucket: String,
    /// Entries in the link log; `None` when the bucket was never walked
    pub links: Option<u64>,
    /// Readable records in the record artifact
    pub records: u64,
    /// Sequence index of the last persisted record
    pub last_index: Option<u64>,
    /// Entries in the enrichment artifact; `None` when stage 2 has not run
    pub enriched: Option<u64>,
    /// Entries in the error ledger
    pub enrichment_errors: Option<u64>,
}

impl BucketStatus {
    /// One-line human summary
    pub fn summary(&self) -> String {
        let links = match self.links {
            Some(n) => format!("{n} links"),
            None => "not walked".to_string(),
        };
        let cursor = match self.last_index {
            Some(i) => format!("last index {i}"),
            None => "no checkpoint".to_string(),
        };
        let enrichment = match (self.enriched, self.enrichment_errors) {
            (Some(ok), Some(failed)) => format!("{ok} enriched, {failed} failed"),
            (Some(ok), None) => format!("{ok} enriched"),
            _ => "not enriched".to_string(),
        };
        format!(
            "{}: {}, {} records, {}, {}",
            self.bucket, links, self.records, cursor, enrichment
        )
    }
}

/// Inspect one bucket without modifying any artifact
///
/// A torn trailing record line is reported as-is; repair happens on the next
/// harvest.
pub fn bucket_status(layout: &ArtifactLayout, bucket: &TimeBucket) -> Result<BucketStatus, CliError> {
    let paths = layout.for_bucket(bucket);

    let links = if paths.link_log.exists() {
        Some(read_link_log(&paths.link_log)?.len() as u64)
    } else {
        None
    };

    let records = if paths.records.exists() {
        read_records(&paths.records)?.len() as u64
    } else {
        0
    };

    let enriched = if paths.enrichment.exists() {
        Some(read_enrichment_results::<serde_json::Value>(&paths.enrichment)?.len() as u64)
    } else {
        None
    };

    let enrichment_errors = if paths.error_ledger.exists() {
        Some(read_error_ledger(&paths.error_ledger)?.len() as u64)
    } else {
        None
    };

    Ok(BucketStatus {
        bucket: bucket.stem(),
        links,
        records,
        last_index: last_sequence_index(&paths.records)?,
        enriched,
        enrichment_errors,
    })
}

impl RangeArgs {
    /// Print the status of every bucket in the range
    pub fn execute_status(&self, cli: &Cli) -> Result<(), CliError> {
        let layout = cli.layout();
        for bucket in self.buckets()? {
            let status = bucket_status(&layout, &bucket)?;
            match cli.output_format {
                OutputFormat::Json => print_json(&status),
                OutputFormat::Human => println!("{}", status.summary()),
            }
        }
        Ok(())
    }
}
