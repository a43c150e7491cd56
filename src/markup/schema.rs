//! Selector schema mapping landmarks to CSS selectors

use super::{Landmark, MarkupError};
use scraper::Selector;

/// Default item namespace on the listing site
pub const DEFAULT_ITEM_PREFIX: &str = "/vulnerability-database/CVE";

/// Where one landmark lives in a document
///
/// `scopes` are alternatives tried in order; the first one that matches at
/// least one element is used. When `target` is set, elements matching it are
/// collected from inside every matched scope element; otherwise the scope
/// elements themselves are the result.
#[derive(Debug, Clone)]
pub struct Locator {
    pub(crate) scopes: Vec<Selector>,
    pub(crate) target: Option<Selector>,
}

impl Locator {
    /// Build a locator from selector source text
    pub fn parse(scopes: &[&str], target: Option<&str>) -> Result<Self, MarkupError> {
        let scopes = scopes
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>, _>>()?;
        let target = target.map(parse_selector).transpose()?;
        Ok(Self { scopes, target })
    }
}

fn parse_selector(source: &str) -> Result<Selector, MarkupError> {
    Selector::parse(source).map_err(|e| MarkupError::InvalidSelector {
        selector: source.to_string(),
        reason: e.to_string(),
    })
}

/// Landmark locations for one source site
#[derive(Debug, Clone)]
pub struct SiteSchema {
    pagination_item: Locator,
    item_link: Locator,
    heading: Locator,
    description: Locator,
    reference_link: Locator,
    severity_score: Locator,
    metric_row: Locator,
    taxonomy_link: Locator,
    pub(crate) row_label: Selector,
    pub(crate) row_value: Selector,
}

impl SiteSchema {
    /// Schema for the default listing site with the given item namespace prefix
    pub fn with_item_prefix(item_prefix: &str) -> Result<Self, MarkupError> {
        let escaped = item_prefix.replace('\\', "\\\\").replace('"', "\\\"");
        let item_link = format!("a[href^=\"{escaped}\"]");

        Ok(Self {
            pagination_item: Locator::parse(&["li.vuln-pagination-item"], None)?,
            item_link: Locator::parse(&[item_link.as_str()], None)?,
            heading: Locator::parse(&["h4"], None)?,
            description: Locator::parse(
                &["div.single-vuln-desc.no-good-to-know", "div.single-vuln-desc"],
                Some("p"),
            )?,
            reference_link: Locator::parse(&["div.reference-row"], Some("a[href]"))?,
            severity_score: Locator::parse(&["div.ranger-value"], Some("label"))?,
            metric_row: Locator::parse(&["table.table.table-report"], Some("tr"))?,
            taxonomy_link: Locator::parse(&["div.light-box"], Some("a[href]"))?,
            row_label: parse_selector("th")?,
            row_value: parse_selector("td")?,
        })
    }

    /// Schema for the default listing site
    pub fn mend() -> Result<Self, MarkupError> {
        Self::with_item_prefix(DEFAULT_ITEM_PREFIX)
    }

    /// Override the locator of a single landmark
    pub fn with_locator(mut self, landmark: Landmark, locator: Locator) -> Self {
        *self.locator_mut(landmark) = locator;
        self
    }

    /// Locator for a landmark
    pub fn locator(&self, landmark: Landmark) -> &Locator {
        match landmark {
            Landmark::PaginationItem => &self.pagination_item,
            Landmark::ItemLink => &self.item_link,
            Landmark::Heading => &self.heading,
            Landmark::Description => &self.description,
            Landmark::ReferenceLink => &self.reference_link,
            Landmark::SeverityScore => &self.severity_score,
            Landmark::MetricRow => &self.metric_row,
            Landmark::TaxonomyLink => &self.taxonomy_link,
        }
    }

    fn locator_mut(&mut self, landmark: Landmark) -> &mut Locator {
        match landmark {
            Landmark::PaginationItem => &mut self.pagination_item,
            Landmark::ItemLink => &mut self.item_link,
            Landmark::Heading => &mut self.heading,
            Landmark::Description => &mut self.description,
            Landmark::ReferenceLink => &mut self.reference_link,
            Landmark::SeverityScore => &mut self.severity_score,
            Landmark::MetricRow => &mut self.metric_row,
            Landmark::TaxonomyLink => &mut self.taxonomy_link,
        }
    }
}
