//! Retry policy shared by every remote call
//!
//! One [`RetryPolicy`] decides how long to wait after each failed attempt and
//! when to give up. Both the listing/detail client and the commit API client
//! drive their requests through [`RetryPolicy::execute`], so the attempt
//! ceiling and the backoff shape are defined in exactly one place.

use rand::Rng;
use std::future::Future;
use std::ops::Range;
use std::time::Duration;
use tracing::{debug, warn};

use super::retry_formatter::{RetryContext, RetryErrorType};
use super::{FetcherError, FetcherResult};
use crate::metrics::record_retry_backoff;

/// Default attempt ceiling per logical fetch
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay (milliseconds)
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Upper bound on any single backoff (seconds)
pub const MAX_BACKOFF_SECS: u64 = 120;

/// A failed attempt, classified
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    /// Failure class, selects the backoff shape
    pub class: RetryErrorType,
    /// Human-readable detail kept for the final error
    pub message: String,
    /// No later attempt can succeed; stop without backing off
    pub permanent: bool,
}

impl AttemptFailure {
    /// Create a classified failure
    pub fn new(class: RetryErrorType, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            permanent: false,
        }
    }

    /// A status the remote will keep answering with (e.g. 404, 422)
    pub fn rejected(status: u16) -> Self {
        Self {
            class: RetryErrorType::HttpStatus(status),
            message: format!("HTTP {status}"),
            permanent: true,
        }
    }
}

/// Backoff and attempt-ceiling configuration
///
/// Delay after failed attempt `n` (zero-based):
/// - blocked (403/429): `base_delay * 2^n` plus a uniform jitter from `blocked_jitter`
/// - transport failure: `base_delay + transport_step * n`
/// - other HTTP status: `status_step * n`
/// - anything else: `fixed_delay`
///
/// Every delay is capped at `max_delay`. No delay follows the final attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per logical fetch, including the first
    pub max_attempts: u32,
    /// Base of the exponential and linear backoff
    pub base_delay: Duration,
    /// Jitter window added to blocked-class delays
    pub blocked_jitter: Range<Duration>,
    /// Linear step for transport failures
    pub transport_step: Duration,
    /// Linear step for non-block HTTP statuses
    pub status_step: Duration,
    /// Delay for decode and unclassified failures
    pub fixed_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            blocked_jitter: Duration::from_millis(250)..Duration::from_millis(450),
            transport_step: Duration::from_secs(1),
            status_step: Duration::from_millis(200),
            fixed_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Policy with every delay scaled down to `unit`, for tests and dry runs
    ///
    /// Keeps the backoff shape (exponential vs linear) but replaces every
    /// second-scale constant with `unit`, and drops the jitter.
    pub fn immediate(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: unit,
            blocked_jitter: Duration::ZERO..Duration::ZERO,
            transport_step: unit,
            status_step: unit,
            fixed_delay: unit,
            max_delay: Duration::from_secs(MAX_BACKOFF_SECS),
        }
    }

    /// Override the attempt ceiling (at least one attempt is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Deterministic part of the delay after failed attempt `attempt`
    pub fn base_delay_for(&self, class: RetryErrorType, attempt: u32) -> Duration {
        let delay = match class {
            RetryErrorType::Blocked(_) => {
                let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            c if c.is_transport() => self
                .base_delay
                .saturating_add(self.transport_step.saturating_mul(attempt)),
            RetryErrorType::HttpStatus(_) => self.status_step.saturating_mul(attempt),
            _ => self.fixed_delay,
        };
        delay.min(self.max_delay)
    }

    /// Full delay after failed attempt `attempt`, jitter included
    pub fn delay_for(&self, class: RetryErrorType, attempt: u32) -> Duration {
        let base = self.base_delay_for(class, attempt);
        let jitter = match class {
            RetryErrorType::Blocked(_) if !self.blocked_jitter.is_empty() => {
                rand::thread_rng().gen_range(self.blocked_jitter.clone())
            }
            _ => Duration::ZERO,
        };
        base.saturating_add(jitter).min(self.max_delay)
    }

    /// Run `attempt_fn` until it succeeds or the attempt ceiling is reached
    ///
    /// `attempt_fn` receives the zero-based attempt number. Each call to
    /// `execute` has its own budget; nothing carries over between calls.
    ///
    /// # Errors
    /// Returns [`FetcherError::Rejected`] at once for a permanent failure,
    /// otherwise [`FetcherError::RetriesExhausted`] carrying the last failure
    /// once every attempt has failed.
    pub async fn execute<T, F, Fut>(&self, url: &str, mut attempt_fn: F) -> FetcherResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_failure: Option<AttemptFailure> = None;

        for attempt in 0..max_attempts {
            match attempt_fn(attempt).await {
                Ok(value) => {
                    if let Some(failure) = &last_failure {
                        let ctx = RetryContext::new(
                            attempt + 1,
                            max_attempts,
                            failure.class,
                            Duration::ZERO,
                            failure.message.clone(),
                            url,
                        );
                        debug!(url = %url, attempt = attempt + 1, "{}", ctx.format_success());
                    }
                    return Ok(value);
                }
                Err(failure) if failure.permanent => {
                    warn!(url = %url, attempt = attempt + 1, error = %failure.message, "Permanent failure, not retrying");
                    return Err(FetcherError::Rejected {
                        attempts: attempt + 1,
                        last_error: failure.message,
                    });
                }
                Err(failure) => {
                    if attempt + 1 < max_attempts {
                        let backoff = self.delay_for(failure.class, attempt);
                        let ctx = RetryContext::new(
                            attempt + 1,
                            max_attempts,
                            failure.class,
                            backoff,
                            failure.message.clone(),
                            url,
                        );
                        warn!(
                            url = %url,
                            attempt = attempt + 1,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %failure.message,
                            "{}",
                            ctx.format_retry()
                        );
                        record_retry_backoff(backoff, failure.class.label());
                        tokio::time::sleep(backoff).await;
                    }
                    last_failure = Some(failure);
                }
            }
        }

        let failure = last_failure
            .unwrap_or_else(|| AttemptFailure::new(RetryErrorType::NetworkGeneric, "no attempt made"));
        let ctx = RetryContext::new(
            max_attempts,
            max_attempts,
            failure.class,
            Duration::ZERO,
            failure.message.clone(),
            url,
        );
        warn!(url = %url, "{}", ctx.format_failure());

        Err(FetcherError::RetriesExhausted {
            attempts: max_attempts,
            last_error: failure.message,
        })
    }
}
