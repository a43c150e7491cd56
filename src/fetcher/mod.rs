//! HTTP fetchers for the listing site and the commit API
//!
//! Both call sites share one retry component ([`retry::RetryPolicy`]) and
//! one failure classification ([`retry_formatter::RetryErrorType`]). A fetch
//! that exhausts its attempts returns [`FetcherError::RetriesExhausted`], and
//! a permanent rejection returns [`FetcherError::Rejected`]; callers treat
//! both as "unit of work unavailable", never as fatal.

use async_trait::async_trait;

pub mod github;
pub mod http;
pub mod identity;
pub mod retry;
pub mod retry_formatter;
pub mod shared_resources;

pub use github::GithubCommitClient;
pub use http::HarvestHttpClient;
pub use retry::RetryPolicy;
pub use shared_resources::global_http_client;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Request could not be built
    #[error("parse error: {0}")]
    ParseError(String),

    /// Every attempt failed
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last failure seen
        last_error: String,
    },

    /// The remote answered with a status no retry can change
    #[error("rejected after {attempts} attempts: {last_error}")]
    Rejected {
        /// Attempts made
        attempts: u32,
        /// The rejecting failure
        last_error: String,
    },
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Source of listing and detail pages
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch a page body
    ///
    /// # Arguments
    /// * `url` - Absolute page URL
    /// * `referer` - Referer to present; the implementation picks a default when `None`
    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> FetcherResult<String>;
}

/// Source of commit metadata documents
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Fetch one commit document from a fully-formed API query URL
    async fn fetch_commit(&self, query_url: &str) -> FetcherResult<serde_json::Value>;
}
