//! Periodic progress lines for long buckets.
//!
//! Used when no progress bar is drawn (JSON output, logs redirected). The
//! executor feeds every processed item in; a line is due after each 10%
//! step, or once per interval on long runs.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const MIN_RUN_DURATION: Duration = Duration::from_secs(30);

/// Progress tracking state for one bucket.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Items processed so far (including items skipped by the cursor).
    pub items_processed: u64,
    /// Records persisted so far.
    pub items_persisted: u64,
    /// Total items in the link log.
    pub total_expected: u64,
    /// Timestamp when the bucket started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between progress updates.
    pub update_interval: Duration,
    /// Last reported completion percentage (0-100).
    pub last_reported_percentage: f64,
    /// Minimum percentage delta required to emit a new update.
    pub min_percentage_step: f64,
}

impl ProgressState {
    /// Create a new progress state with default intervals.
    pub fn new(total_expected: u64) -> Self {
        let now = Instant::now();
        Self {
            items_processed: 0,
            items_persisted: 0,
            total_expected,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            last_reported_percentage: 0.0,
            min_percentage_step: 10.0,
        }
    }

    /// Count one processed item.
    pub fn record(&mut self, persisted: bool) {
        self.items_processed = self.items_processed.saturating_add(1);
        if persisted {
            self.items_persisted = self.items_persisted.saturating_add(1);
        }
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_expected == 0 {
            return 100.0;
        }
        (self.items_processed as f64 / self.total_expected as f64) * 100.0
    }

    /// Items per second since start.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.items_processed as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Whether a progress update should be emitted based on time or percentage.
    pub fn should_emit_update(&self) -> bool {
        if self.items_processed == 0 {
            return false;
        }
        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }
        self.start_time.elapsed() >= MIN_RUN_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress log to reset timers and cached percentage.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Estimate remaining time from the current rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let rate = self.rate();
        let remaining = self.total_expected.saturating_sub(self.items_processed);
        if rate > 0.0 && remaining > 0 {
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        }
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] Processed {}/{} items - {:.1}% complete, {} persisted",
            self.items_processed,
            self.total_expected,
            self.percentage(),
            self.items_persisted
        )];

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
