//! Listing walker
//!
//! Enumerates every item link of a bucket across its listing pages and
//! caches them in the bucket's link log. Once the log exists the bucket is
//! never walked again; its line order is the sequence-index order.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::fetcher::PageSource;
use crate::markup::{HtmlDocument, Landmark, MarkupDocument, SiteSchema};
use crate::output::{read_link_log, write_link_log, OutputResult};
use crate::shutdown::SharedShutdown;
use crate::{ItemReference, TimeBucket};

use super::config::HarvestConfig;
use super::pacing::DelayWindow;

/// Highest page number shown by the pagination control
///
/// The second-to-last entry is the last page number (the last one is the
/// "next" arrow). Defaults to 1 when the control is absent or unreadable.
pub fn parse_max_page(doc: &dyn MarkupDocument) -> u32 {
    let items = doc.texts(Landmark::PaginationItem);
    items
        .len()
        .checked_sub(2)
        .and_then(|i| items.get(i))
        .and_then(|text| text.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Item links of one listing page, in document order
///
/// Locations are normalised to a single trimmed line the way URL parsing
/// treats them (tabs and line breaks removed); empty ones are dropped.
pub fn collect_item_links(doc: &dyn MarkupDocument) -> Vec<ItemReference> {
    doc.anchors(Landmark::ItemLink)
        .into_iter()
        .filter_map(|anchor| {
            let location = normalize_location(&anchor.href);
            (!location.is_empty()).then(|| ItemReference {
                display_text: anchor.text,
                location,
            })
        })
        .collect()
}

fn normalize_location(href: &str) -> String {
    href.chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_first_page(body: &str, schema: &SiteSchema) -> (u32, Vec<ItemReference>) {
    let doc = HtmlDocument::parse(body, schema);
    (parse_max_page(&doc), collect_item_links(&doc))
}

fn parse_page(body: &str, schema: &SiteSchema) -> Vec<ItemReference> {
    let doc = HtmlDocument::parse(body, schema);
    collect_item_links(&doc)
}

/// Walks a bucket's listing pages
pub struct ListingWalker {
    source: Arc<dyn PageSource>,
    schema: Arc<SiteSchema>,
    config: HarvestConfig,
    page_delay: DelayWindow,
    shutdown: Option<SharedShutdown>,
}

impl ListingWalker {
    /// Create a walker
    pub fn new(source: Arc<dyn PageSource>, schema: Arc<SiteSchema>, config: HarvestConfig) -> Self {
        let page_delay = config.pacing.listing_page;
        Self {
            source,
            schema,
            config,
            page_delay,
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle
    pub fn with_shutdown(mut self, shutdown: Option<SharedShutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Discover every item link of `bucket`
    ///
    /// Returns `None` when page 1 is unavailable, or when a shutdown request
    /// arrives mid-walk; a partial walk must not become the cached link log.
    /// A later page that stays unavailable is logged and its links omitted.
    pub async fn walk(&self, bucket: &TimeBucket) -> Option<Vec<ItemReference>> {
        let first_url = self.config.listing_url(bucket, 1);

        let body = match self.source.fetch_page(&first_url, None).await {
            Ok(body) => body,
            Err(e) => {
                warn!(bucket = %bucket, url = %first_url, error = %e, "Initial listing page unavailable, skipping bucket");
                return None;
            }
        };
        let (max_page, mut links) = parse_first_page(&body, &self.schema);
        info!(bucket = %bucket, pages = max_page, first_page_links = links.len(), "Listing discovered");

        for page in 2..=max_page {
            if !self.page_delay.wait(self.shutdown.as_deref()).await {
                warn!(bucket = %bucket, page, "Shutdown requested during listing walk");
                return None;
            }

            let url = self.config.listing_url(bucket, page);
            match self.source.fetch_page(&url, Some(&first_url)).await {
                Ok(body) => {
                    let page_links = parse_page(&body, &self.schema);
                    debug!(bucket = %bucket, page, links = page_links.len(), "Listing page parsed");
                    links.extend(page_links);
                }
                Err(e) => {
                    warn!(bucket = %bucket, page, url = %url, error = %e, "Listing page unavailable, omitting its links");
                }
            }
        }

        Some(links)
    }

    /// Load the cached link log, walking the bucket first if there is none
    ///
    /// Returns `Ok(None)` when the walk could not produce a log.
    pub async fn ensure_link_log(
        &self,
        bucket: &TimeBucket,
        link_log: &Path,
    ) -> OutputResult<Option<Vec<String>>> {
        if link_log.exists() {
            let links = read_link_log(link_log)?;
            info!(bucket = %bucket, links = links.len(), "Using cached link log");
            return Ok(Some(links));
        }

        let Some(items) = self.walk(bucket).await else {
            return Ok(None);
        };
        write_link_log(link_log, &items)?;
        // hand back what a later run will read, so sequence indices never shift
        Ok(Some(read_link_log(link_log)?))
    }
}
