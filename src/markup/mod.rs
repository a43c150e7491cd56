//! Landmark-based extraction interface
//!
//! The harvester never walks a markup tree directly. It asks a
//! [`MarkupDocument`] for a [`Landmark`] and receives plain text, anchors or
//! label/value rows. Where a landmark lives in the markup is described by a
//! [`SiteSchema`], so a layout change on the source site is a schema change,
//! not a code change.
//!
//! Missing landmarks are never an error: they yield an empty result.

pub mod html;
pub mod schema;

pub use html::HtmlDocument;
pub use schema::SiteSchema;

/// Structural anchors the pipeline reads from listing and detail pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landmark {
    /// Entries of the listing's pagination control
    PaginationItem,
    /// Anchors pointing into the item namespace on a listing page
    ItemLink,
    /// Headings carrying `Date:` / `Language:` labels
    Heading,
    /// Narrative description paragraph
    Description,
    /// Anchors inside the reference-link blocks
    ReferenceLink,
    /// Severity score label
    SeverityScore,
    /// Rows of the metrics table
    MetricRow,
    /// Anchors inside the classification tag container
    TaxonomyLink,
}

/// An anchor's text and target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Trimmed anchor text
    pub text: String,
    /// Raw `href` attribute value
    pub href: String,
}

/// Markup extraction errors
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    /// A schema selector could not be parsed
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// Selector source text
        selector: String,
        /// Parser message
        reason: String,
    },
}

/// Read-only access to a parsed document by landmark
pub trait MarkupDocument {
    /// Trimmed text of every element at `landmark`, in document order
    fn texts(&self, landmark: Landmark) -> Vec<String>;

    /// Every anchor with an `href` at `landmark`, in document order
    fn anchors(&self, landmark: Landmark) -> Vec<Anchor>;

    /// Label/value pairs of every well-formed row at `landmark`
    ///
    /// Rows missing either the label or the value cell are skipped.
    fn rows(&self, landmark: Landmark) -> Vec<(String, String)>;

    /// Text of the first element at `landmark`
    fn first_text(&self, landmark: Landmark) -> Option<String> {
        self.texts(landmark).into_iter().next()
    }
}
