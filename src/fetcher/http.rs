//! HTTP client for listing and detail pages
//!
//! Wraps the shared `reqwest` client with browser-like identity headers and
//! the crate's [`RetryPolicy`]. Returns the raw page body; parsing happens in
//! the caller so the parsed tree never crosses an `.await`.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use super::identity::browser_headers;
use super::retry::{AttemptFailure, RetryPolicy};
use super::retry_formatter::extract_error_type;
use super::{FetcherResult, PageSource};
use crate::metrics::HttpRequestMetrics;

/// Page fetcher for the vulnerability listing site
pub struct HarvestHttpClient {
    client: Arc<Client>,
    default_referer: String,
    policy: RetryPolicy,
}

impl HarvestHttpClient {
    /// Create new page client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (Arc for cheap cloning)
    /// * `default_referer` - Referer used when a call supplies none
    /// * `policy` - Retry policy applied to every fetch
    pub fn new(client: Arc<Client>, default_referer: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            default_referer: default_referer.into(),
            policy,
        }
    }

    /// Retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Default referer
    pub fn default_referer(&self) -> &str {
        &self.default_referer
    }

    async fn attempt(&self, url: &str, referer: &str, attempt: u32) -> Result<String, AttemptFailure> {
        let metrics = HttpRequestMetrics::start(url, attempt + 1);

        let response = match self
            .client
            .get(url)
            .headers(browser_headers(referer))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                metrics.record_network_error();
                return Err(AttemptFailure::new(
                    extract_error_type(None, Some(&e)),
                    format!("Network error: {e}"),
                ));
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if !status.is_success() {
            return Err(AttemptFailure::new(
                extract_error_type(Some(status), None),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        response.text().await.map_err(|e| {
            AttemptFailure::new(
                extract_error_type(None, Some(&e)),
                format!("Failed to read body: {e}"),
            )
        })
    }
}

#[async_trait]
impl PageSource for HarvestHttpClient {
    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> FetcherResult<String> {
        let referer = referer.unwrap_or(&self.default_referer);
        debug!(url = %url, referer = %referer, "Fetching page");

        self.policy
            .execute(url, |attempt| self.attempt(url, referer, attempt))
            .await
    }
}
