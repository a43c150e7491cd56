//! Failure classification and retry message formatting.
//!
//! Every failed attempt is reduced to a [`RetryErrorType`], which decides the
//! backoff shape, and a [`RetryContext`], which renders consistent log lines.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// HTTP 403 or 429: rate limited or blocked as a bot
    Blocked(u16),
    /// Any other non-success HTTP status
    HttpStatus(u16),
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// Other transport failure
    NetworkGeneric,
    /// Response arrived but its body could not be read or parsed
    Decode,
}

impl RetryErrorType {
    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Blocked(403) => "request blocked (403)",
            Self::Blocked(_) => "rate limit exceeded",
            Self::HttpStatus(code) => match code {
                404 => "resource not found",
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "unexpected HTTP status",
            },
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::NetworkGeneric => "network error",
            Self::Decode => "unreadable response",
        }
    }

    /// Suggested remediation presented after the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "The site is throttling this client; slow down pacing or retry later",
            Self::HttpStatus(_) => "The page may have moved or been removed",
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::NetworkGeneric => "Check network connectivity and try again",
            Self::Decode => "The response format may have changed",
        }
    }

    /// Whether this failure is a transport failure (linear backoff class).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric
        )
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Blocked(_) => "blocked",
            Self::HttpStatus(_) => "status",
            Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric => "transport",
            Self::Decode => "decode",
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// Underlying error message
    pub error_message: String,
    /// URL that failed
    pub url: String,
}

impl RetryContext {
    /// Convenience constructor used throughout the retry logic.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        error_message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            error_message: error_message.into(),
            url: url.into(),
        }
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt + 1,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64(),
            self.url
        )
    }

    /// Format retry success message when a previous attempt eventually works.
    pub fn format_success(&self) -> String {
        format!(
            "Attempt {}/{} succeeded after earlier failures ({})",
            self.attempt, self.max_attempts, self.url
        )
    }

    /// Format final failure summary with a suggestion.
    pub fn format_failure(&self) -> String {
        [
            format!("[FAILED] Fetch failed after {} attempts", self.max_attempts),
            format!("  Last error: {}", self.error_message),
            format!("  URL: {}", self.url),
            format!("  Suggestion: {}", self.error_type.suggestion()),
        ]
        .join("\n")
    }
}

/// Extract a [`RetryErrorType`] from an HTTP status or reqwest error.
pub fn extract_error_type(
    status: Option<StatusCode>,
    err: Option<&ReqwestError>,
) -> RetryErrorType {
    if let Some(status) = status {
        return match status.as_u16() {
            code @ (403 | 429) => RetryErrorType::Blocked(code),
            code => RetryErrorType::HttpStatus(code),
        };
    }

    if let Some(err) = err {
        if err.is_timeout() {
            return RetryErrorType::NetworkTimeout;
        }
        if err.is_connect() {
            return RetryErrorType::NetworkOffline;
        }
        if err.is_body() || err.is_decode() {
            return RetryErrorType::Decode;
        }
    }

    RetryErrorType::NetworkGeneric
}
