//! Politeness delays between requests
//!
//! Every delay is a `tokio::time::sleep` that a shutdown request can cut
//! short; nothing here busy-waits.

use rand::Rng;
use std::time::Duration;

use crate::shutdown::ShutdownCoordinator;

/// A delay drawn uniformly from `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    min: Duration,
    max: Duration,
}

impl DelayWindow {
    /// Uniform window; bounds are swapped if given in the wrong order
    pub fn uniform(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Uniform window in milliseconds
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// Always the same delay
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// No delay
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Lower bound
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw one delay
    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Sleep for one sampled delay
    ///
    /// Returns `false` when the sleep was interrupted by a shutdown request.
    pub async fn wait(&self, shutdown: Option<&ShutdownCoordinator>) -> bool {
        let delay = self.sample();
        match shutdown {
            Some(shutdown) => shutdown.sleep(delay).await,
            None => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                true
            }
        }
    }
}

/// Delays applied by both stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Before each listing page after the first
    pub listing_page: DelayWindow,
    /// Before each detail fetch
    pub item_before: DelayWindow,
    /// After each successful detail fetch
    pub item_after: DelayWindow,
    /// After each enrichment query
    pub enrichment: DelayWindow,
}

impl Pacing {
    /// Delays tuned for the public listing site
    pub const fn polite() -> Self {
        Self {
            listing_page: DelayWindow::millis(200, 500),
            item_before: DelayWindow::millis(100, 200),
            item_after: DelayWindow::millis(200, 500),
            enrichment: DelayWindow::millis(200, 200),
        }
    }

    /// No delays at all
    pub const fn none() -> Self {
        Self {
            listing_page: DelayWindow::none(),
            item_before: DelayWindow::none(),
            item_after: DelayWindow::none(),
            enrichment: DelayWindow::none(),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::polite()
    }
}
