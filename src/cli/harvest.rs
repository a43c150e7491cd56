//! Harvest, enrich and run commands

use crate::fetcher::{global_http_client, GithubCommitClient, HarvestHttpClient, RetryPolicy};
use crate::harvester::{
    EnrichmentConfig, EnrichmentCorrelator, EnrichmentReport, HarvestConfig, HarvestError,
    HarvestExecutor, HarvestReport, Pacing, TaxonomyFilter,
};
use crate::output::ArtifactLayout;
use crate::shutdown::SharedShutdown;
use crate::TimeBucket;
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::CliError;

/// Maximum allowed bucket concurrency; the listing site blocks aggressive clients
const MAX_CONCURRENCY: usize = 8;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Vulnerability harvester CLI
#[derive(Parser, Debug)]
#[command(name = "vuln-harvester")]
#[command(about = "Harvest vulnerability records and enrich them with commit metadata", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Data directory holding logs/, results/ and crawl_result/
    #[arg(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// Maximum attempts per request (default: 5, range: 1-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: u32,

    /// Number of buckets processed concurrently (default: 1, max: 8)
    ///
    /// Items within a bucket are always processed in link-log order.
    #[arg(long, global = true, default_value = "1", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Comma-separated CWE allow-set (e.g. "79,798" or "CWE-327")
    #[arg(long, global = true)]
    pub allow_cwe: Option<TaxonomyFilter>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Disable politeness delays between requests
    #[arg(long, global = true, default_value_t = false)]
    pub no_pacing: bool,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk listings and persist filtered records (stage 1)
    Harvest(RangeArgs),

    /// Enrich persisted records with commit metadata (stage 2)
    Enrich(EnrichArgs),

    /// Harvest every bucket, then enrich every bucket
    Run(EnrichArgs),

    /// Show artifact state per bucket without touching anything
    Status(RangeArgs),
}

/// Inclusive bucket range
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First bucket (YYYY-MM); defaults to the current month
    #[arg(long)]
    pub from: Option<TimeBucket>,

    /// Last bucket (YYYY-MM); defaults to the current month
    #[arg(long)]
    pub to: Option<TimeBucket>,
}

impl RangeArgs {
    /// Buckets covered by the range, in chronological order
    pub fn buckets(&self) -> Result<Vec<TimeBucket>, CliError> {
        let current = TimeBucket::current();
        let from = self.from.unwrap_or(current);
        let to = self.to.unwrap_or(current);
        if from > to {
            return Err(CliError::InvalidArgument(format!(
                "--from {from} is after --to {to}"
            )));
        }
        Ok(TimeBucket::range_inclusive(from, to))
    }
}

/// Arguments for commands that query the commits API
#[derive(Args, Debug, Clone)]
pub struct EnrichArgs {
    /// Bucket range
    #[command(flatten)]
    pub range: RangeArgs,

    /// GitHub token for the commits API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// Artifact layout rooted at `--data-dir`
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(self.data_dir.clone())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_attempts(self.max_attempts)
    }

    fn pacing(&self) -> Pacing {
        if self.no_pacing {
            Pacing::none()
        } else {
            Pacing::polite()
        }
    }

    /// Stage 1 configuration from the global flags
    pub fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig {
            layout: self.layout(),
            retry_policy: self.retry_policy(),
            pacing: self.pacing(),
            filter: self.allow_cwe.clone().unwrap_or_default(),
            ..HarvestConfig::default()
        }
    }

    /// Stage 2 configuration from the global flags
    pub fn enrichment_config(&self) -> EnrichmentConfig {
        EnrichmentConfig {
            layout: self.layout(),
            retry_policy: self.retry_policy(),
            delay: self.pacing().enrichment,
            ..EnrichmentConfig::default()
        }
    }
}

impl RangeArgs {
    /// Execute stage 1 over the range
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let buckets = self.buckets()?;
        harvest_buckets(cli, &buckets, shutdown).await
    }
}

impl EnrichArgs {
    /// Execute stage 2 over the range
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let buckets = self.range.buckets()?;
        enrich_buckets(cli, &buckets, self.github_token.clone(), shutdown).await
    }

    /// Execute stage 1 over the whole range, then stage 2 over the whole range
    ///
    /// A bucket that fails stage 1 does not stop stage 2; the first error of
    /// either stage is returned once both have run.
    pub async fn execute_run(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let buckets = self.range.buckets()?;
        let harvested = harvest_buckets(cli, &buckets, shutdown.clone()).await;
        if shutdown.is_shutdown_requested() {
            warn!("Shutdown requested, skipping enrichment");
            return harvested;
        }
        let enriched = enrich_buckets(cli, &buckets, self.github_token.clone(), shutdown).await;
        harvested.and(enriched)
    }
}

// ─── Stage drivers ───────────────────────────────────────────────────────────

async fn harvest_buckets(
    cli: &Cli,
    buckets: &[TimeBucket],
    shutdown: SharedShutdown,
) -> Result<(), CliError> {
    let config = cli.harvest_config();
    let client = HarvestHttpClient::new(
        global_http_client(),
        config.detail_referer(),
        config.retry_policy.clone(),
    );
    let executor = HarvestExecutor::new(Arc::new(client), config)?.with_shutdown(shutdown.clone());
    let executor = &executor;

    let multi = (cli.output_format == OutputFormat::Human).then(MultiProgress::new);
    let multi = &multi;

    info!(
        buckets = buckets.len(),
        concurrency = cli.concurrency,
        "Starting harvest"
    );

    let mut results: Vec<(usize, TimeBucket, Option<Result<HarvestReport, HarvestError>>)> =
        stream::iter(buckets.iter().copied().enumerate())
            .map(|(position, bucket)| {
                let shutdown = shutdown.clone();
                async move {
                    if shutdown.is_shutdown_requested() {
                        return (position, bucket, None);
                    }
                    let progress = multi.as_ref().map(|m| m.add(create_progress_bar()));
                    let result = executor.harvest_bucket(bucket, progress).await;
                    (position, bucket, Some(result))
                }
            })
            .buffer_unordered(cli.concurrency)
            .collect()
            .await;
    results.sort_by_key(|(position, _, _)| *position);

    let mut first_error = None;
    for (_, bucket, result) in results {
        match result {
            None => warn!(bucket = %bucket, "Shutdown requested, bucket not started"),
            Some(Ok(report)) => print_harvest_report(cli.output_format, &report),
            Some(Err(e)) => {
                print_failure(cli.output_format, &bucket, "harvest", &e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

async fn enrich_buckets(
    cli: &Cli,
    buckets: &[TimeBucket],
    token: Option<String>,
    shutdown: SharedShutdown,
) -> Result<(), CliError> {
    let config = cli.enrichment_config();
    let client = GithubCommitClient::new(global_http_client(), token, config.retry_policy.clone());
    let correlator =
        EnrichmentCorrelator::new(Arc::new(client), config).with_shutdown(shutdown.clone());
    let correlator = &correlator;

    info!(
        buckets = buckets.len(),
        concurrency = cli.concurrency,
        "Starting enrichment"
    );

    let mut results: Vec<(usize, TimeBucket, Option<Result<Option<EnrichmentReport>, HarvestError>>)> =
        stream::iter(buckets.iter().copied().enumerate())
            .map(|(position, bucket)| {
                let shutdown = shutdown.clone();
                async move {
                    if shutdown.is_shutdown_requested() {
                        return (position, bucket, None);
                    }
                    (position, bucket, Some(correlator.enrich_bucket(bucket).await))
                }
            })
            .buffer_unordered(cli.concurrency)
            .collect()
            .await;
    results.sort_by_key(|(position, _, _)| *position);

    let mut first_error = None;
    for (_, bucket, result) in results {
        match result {
            None => warn!(bucket = %bucket, "Shutdown requested, bucket not started"),
            Some(Ok(Some(report))) => print_enrichment_report(cli.output_format, &report),
            Some(Ok(None)) => print_enrichment_skipped(cli.output_format, &bucket),
            Some(Err(e)) => {
                print_failure(cli.output_format, &bucket, "enrich", &e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StageOutput<'a, T: Serialize> {
    stage: &'static str,
    success: bool,
    #[serde(flatten)]
    report: &'a T,
}

pub(super) fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => error!("Failed to serialize output: {}", e),
    }
}

fn print_harvest_report(format: OutputFormat, report: &HarvestReport) {
    match format {
        OutputFormat::Json => print_json(&StageOutput {
            stage: "harvest",
            success: true,
            report,
        }),
        OutputFormat::Human => println!("{}", report.summary()),
    }
}

fn print_enrichment_report(format: OutputFormat, report: &EnrichmentReport) {
    match format {
        OutputFormat::Json => print_json(&StageOutput {
            stage: "enrich",
            success: true,
            report,
        }),
        OutputFormat::Human => println!("{}", report.summary()),
    }
}

fn print_enrichment_skipped(format: OutputFormat, bucket: &TimeBucket) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "stage": "enrich",
            "success": true,
            "bucket": bucket.stem(),
            "skipped": "no record artifact",
        })),
        OutputFormat::Human => println!("{}: no record artifact, skipped", bucket.stem()),
    }
}

fn print_failure(format: OutputFormat, bucket: &TimeBucket, stage: &'static str, e: &HarvestError) {
    error!(bucket = %bucket, stage, "Bucket failed: {}", e);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "stage": stage,
            "success": false,
            "bucket": bucket.stem(),
            "error": e.to_string(),
        })),
        OutputFormat::Human => eprintln!("{}: {} failed: {}", bucket.stem(), stage, e),
    }
}

// ─── Progress bar ────────────────────────────────────────────────────────────

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb
}
