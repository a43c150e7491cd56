//! Detail page extraction
//!
//! Maps the landmarks of one detail page onto a [`VulnerabilityRecord`].
//! Every landmark is optional: a missing one leaves its field at the default
//! and never aborts the item.

use std::sync::Arc;

use crate::fetcher::{FetcherResult, PageSource};
use crate::markup::{HtmlDocument, Landmark, MarkupDocument, SiteSchema};
use crate::{CvssMetrics, VulnerabilityRecord};

const DATE_LABEL: &str = "Date:";
const LANGUAGE_LABEL: &str = "Language:";
const TAXONOMY_MARKER: &str = "CWE";

/// Identifier of an item: the last `/`-separated segment of its location
pub fn identifier_from_location(location: &str) -> String {
    location
        .trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Build a record from a parsed detail page
pub fn extract_record(
    doc: &dyn MarkupDocument,
    location: &str,
    sequence_index: u64,
) -> VulnerabilityRecord {
    let mut record = VulnerabilityRecord::new(sequence_index, identifier_from_location(location));

    for heading in doc.texts(Landmark::Heading) {
        if heading.contains(DATE_LABEL) {
            record.published_date = Some(heading.replace(DATE_LABEL, "").trim().to_string());
        } else if heading.contains(LANGUAGE_LABEL) {
            record.language = Some(heading.replace(LANGUAGE_LABEL, "").trim().to_string());
        }
    }

    record.description = doc.first_text(Landmark::Description);

    record.reference_links = doc
        .anchors(Landmark::ReferenceLink)
        .into_iter()
        .map(|anchor| anchor.href)
        .collect();

    // an absent score is recorded as an empty one
    record.severity_score = Some(doc.first_text(Landmark::SeverityScore).unwrap_or_default());

    record.metrics = metrics_from_rows(&doc.rows(Landmark::MetricRow));

    record.classification_codes = doc
        .anchors(Landmark::TaxonomyLink)
        .into_iter()
        .filter(|anchor| anchor.text.contains(TAXONOMY_MARKER))
        .map(|anchor| anchor.text)
        .collect();

    record
}

fn metrics_from_rows(rows: &[(String, String)]) -> CvssMetrics {
    let mut metrics = CvssMetrics::default();
    for (label, value) in rows {
        let slot = if label.contains("Attack Vector") {
            &mut metrics.attack_vector
        } else if label.contains("Attack Complexity") {
            &mut metrics.attack_complexity
        } else if label.contains("Privileges Required") {
            &mut metrics.privileges_required
        } else if label.contains("User Interaction") {
            &mut metrics.user_interaction
        } else if label.contains("Scope") {
            &mut metrics.scope
        } else if label.contains("Confidentiality") {
            &mut metrics.confidentiality
        } else if label.contains("Integrity") {
            &mut metrics.integrity
        } else if label.contains("Availability") {
            &mut metrics.availability
        } else {
            continue;
        };
        *slot = Some(value.clone());
    }
    metrics
}

/// Parse a detail page body and extract its record
pub fn extract_from_body(
    body: &str,
    schema: &SiteSchema,
    location: &str,
    sequence_index: u64,
) -> VulnerabilityRecord {
    let doc = HtmlDocument::parse(body, schema);
    extract_record(&doc, location, sequence_index)
}

/// Fetches detail pages and extracts records
pub struct ItemExtractor {
    source: Arc<dyn PageSource>,
    schema: Arc<SiteSchema>,
    site_root: String,
    referer: String,
}

impl ItemExtractor {
    /// Create an extractor
    ///
    /// # Arguments
    /// * `source` - Page source used for detail fetches
    /// * `schema` - Landmark locations
    /// * `site_root` - Prepended to every item location
    /// * `referer` - Referer presented on every detail fetch
    pub fn new(
        source: Arc<dyn PageSource>,
        schema: Arc<SiteSchema>,
        site_root: impl Into<String>,
        referer: impl Into<String>,
    ) -> Self {
        Self {
            source,
            schema,
            site_root: site_root.into(),
            referer: referer.into(),
        }
    }

    /// Absolute URL of an item location
    pub fn detail_url(&self, location: &str) -> String {
        let root = self.site_root.trim_end_matches('/');
        if location.starts_with('/') {
            format!("{root}{location}")
        } else {
            format!("{root}/{location}")
        }
    }

    /// Fetch one item and extract its record
    ///
    /// # Errors
    /// Returns the fetch failure when the page is unavailable after retries.
    pub async fn extract(
        &self,
        location: &str,
        sequence_index: u64,
    ) -> FetcherResult<VulnerabilityRecord> {
        let url = self.detail_url(location);
        let body = self.source.fetch_page(&url, Some(&self.referer)).await?;
        Ok(extract_from_body(&body, &self.schema, location, sequence_index))
    }
}
