//! Observability metrics for the harvester
//!
//! Counters and histograms for HTTP traffic, retries, persisted/skipped
//! items and enrichment queries.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Optional Prometheus exporter for a scrape endpoint (`--metrics-addr`)
//! - Without an installed recorder every call is a no-op

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Socket address to bind Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the listing site and commit API"
    );

    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Total number of retry attempts, labelled by failure class"
    );

    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );

    describe_counter!(
        "items_persisted_total",
        Unit::Count,
        "Total number of records appended to record artifacts"
    );

    describe_counter!(
        "items_skipped_total",
        Unit::Count,
        "Total number of items not persisted, labelled by reason"
    );

    describe_counter!(
        "enrichment_queries_total",
        Unit::Count,
        "Total number of commit API queries, labelled by outcome"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Record an HTTP request with timing
pub struct HttpRequestMetrics {
    url: String,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start recording a new HTTP request
    pub fn start(url: impl Into<String>, attempt: u32) -> Self {
        let url = url.into();
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            url = %url,
            attempt = attempt,
            "Starting HTTP request"
        );

        Self {
            url,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record completion of the HTTP request
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!("http_requests_total", "status" => status_code.to_string()).increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        if status_code == 403 || status_code == 429 {
            warn!(
                correlation_id = %self.correlation_id,
                url = %self.url,
                attempt = self.attempt,
                status = status_code,
                duration_ms = duration.as_millis() as u64,
                "Request blocked by remote"
            );
        } else {
            debug!(
                correlation_id = %self.correlation_id,
                url = %self.url,
                status = status_code,
                duration_ms = duration.as_millis() as u64,
                "HTTP request completed"
            );
        }
    }

    /// Record a network error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!("http_requests_total", "status" => "network_error").increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            url = %self.url,
            attempt = self.attempt,
            duration_ms = duration.as_millis() as u64,
            "Network error recorded"
        );
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, class: &'static str) {
    counter!("http_retries_total", "class" => class).increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());
}

/// Record one appended record
pub fn record_item_persisted() {
    counter!("items_persisted_total").increment(1);
}

/// Record an item that was not persisted
pub fn record_item_skipped(reason: &'static str) {
    counter!("items_skipped_total", "reason" => reason).increment(1);
}

/// Record the outcome of one enrichment query
pub fn record_enrichment_query(outcome: &'static str) {
    counter!("enrichment_queries_total", "outcome" => outcome).increment(1);
}
