//! GitHub commits API client
//!
//! Fetches one commit document per query URL. Authentication is optional;
//! without a token the API's anonymous quota applies.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use super::retry::{AttemptFailure, RetryPolicy};
use super::retry_formatter::{extract_error_type, RetryErrorType};
use super::{CommitSource, FetcherError, FetcherResult};
use crate::metrics::HttpRequestMetrics;

/// Default REST API base
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// API version pinned in every request
pub const API_VERSION: &str = "2022-11-28";

const API_USER_AGENT: &str = "vuln-harvester/0.1";

/// Commit metadata client
pub struct GithubCommitClient {
    client: Arc<Client>,
    token: Option<String>,
    policy: RetryPolicy,
}

impl GithubCommitClient {
    /// Create new commit client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `token` - Bearer token; `None` sends unauthenticated requests
    /// * `policy` - Retry policy applied to every query
    pub fn new(client: Arc<Client>, token: Option<String>, policy: RetryPolicy) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        if token.is_none() {
            warn!("No GitHub token configured; commit queries will be rate limited as anonymous");
        }
        Self {
            client,
            token,
            policy,
        }
    }

    /// Whether requests carry a bearer token
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn headers(&self) -> FetcherResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        if let Some(token) = &self.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| FetcherError::ParseError(format!("Invalid token header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    async fn attempt(
        &self,
        url: &str,
        headers: HeaderMap,
        attempt: u32,
    ) -> Result<serde_json::Value, AttemptFailure> {
        let metrics = HttpRequestMetrics::start(url, attempt + 1);

        let response = match self.client.get(url).headers(headers).send().await {
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

        if status.is_client_error() && !matches!(status.as_u16(), 403 | 429) {
            return Err(AttemptFailure::rejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(AttemptFailure::new(
                extract_error_type(Some(status), None),
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            AttemptFailure::new(
                extract_error_type(None, Some(&e)),
                format!("Failed to read body: {e}"),
            )
        })?;

        serde_json::from_str(&body).map_err(|e| {
            AttemptFailure::new(RetryErrorType::Decode, format!("Invalid JSON: {e}"))
        })
    }
}

#[async_trait]
impl CommitSource for GithubCommitClient {
    async fn fetch_commit(&self, query_url: &str) -> FetcherResult<serde_json::Value> {
        let headers = self.headers()?;
        debug!(url = %query_url, "Querying commit API");

        self.policy
            .execute(query_url, |attempt| {
                self.attempt(query_url, headers.clone(), attempt)
            })
            .await
    }
}
