//! Harvest configuration
//!
//! Defaults target the public Mend vulnerability database and the GitHub
//! REST API.

use crate::fetcher::github::DEFAULT_API_BASE;
use crate::fetcher::RetryPolicy;
use crate::markup::schema::DEFAULT_ITEM_PREFIX;
use crate::output::ArtifactLayout;
use crate::TimeBucket;

use super::filter::TaxonomyFilter;
use super::pacing::{DelayWindow, Pacing};

/// Listing root; bucket listings live under `{base}/full-listing/`
pub const DEFAULT_LISTING_BASE: &str = "https://www.mend.io/vulnerability-database";

/// Site root prepended to item locations
pub const DEFAULT_SITE_ROOT: &str = "https://www.mend.io";

/// Stage 1 configuration
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Listing root, without trailing slash
    pub listing_base: String,
    /// Site root, without trailing slash
    pub site_root: String,
    /// Path prefix identifying item links on listing pages
    pub item_prefix: String,
    /// Artifact directory layout
    pub layout: ArtifactLayout,
    /// Retry policy for page fetches
    pub retry_policy: RetryPolicy,
    /// Politeness delays
    pub pacing: Pacing,
    /// CWE allow-set
    pub filter: TaxonomyFilter,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_base: DEFAULT_LISTING_BASE.to_string(),
            site_root: DEFAULT_SITE_ROOT.to_string(),
            item_prefix: DEFAULT_ITEM_PREFIX.to_string(),
            layout: ArtifactLayout::default(),
            retry_policy: RetryPolicy::default(),
            pacing: Pacing::default(),
            filter: TaxonomyFilter::default(),
        }
    }
}

impl HarvestConfig {
    /// Referer presented on detail fetches (`{listing base}/`)
    pub fn detail_referer(&self) -> String {
        format!("{}/", self.listing_base.trim_end_matches('/'))
    }

    /// Listing URL for one page of a bucket; page 1 has no page segment
    pub fn listing_url(&self, bucket: &TimeBucket, page: u32) -> String {
        let base = format!(
            "{}/full-listing/{}/{}",
            self.listing_base.trim_end_matches('/'),
            bucket.year(),
            bucket.month()
        );
        if page <= 1 {
            base
        } else {
            format!("{base}/{page}")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listing_base.trim().is_empty() {
            return Err("listing base must not be empty".to_string());
        }
        if self.site_root.trim().is_empty() {
            return Err("site root must not be empty".to_string());
        }
        if self.item_prefix.trim().is_empty() {
            return Err("item prefix must not be empty".to_string());
        }
        if self.retry_policy.max_attempts == 0 {
            return Err("retry policy needs at least one attempt".to_string());
        }
        if self.filter.allowed().is_empty() {
            return Err("CWE allow-set must not be empty".to_string());
        }
        Ok(())
    }
}

/// Stage 2 configuration
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// REST API base, without trailing slash
    pub api_base: String,
    /// Artifact directory layout
    pub layout: ArtifactLayout,
    /// Retry policy for commit queries
    pub retry_policy: RetryPolicy,
    /// Delay after every query
    pub delay: DelayWindow,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            layout: ArtifactLayout::default(),
            retry_policy: RetryPolicy::default(),
            delay: Pacing::polite().enrichment,
        }
    }
}
