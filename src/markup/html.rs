//! [`MarkupDocument`] implementation over `scraper`

use super::schema::{Locator, SiteSchema};
use super::{Anchor, Landmark, MarkupDocument};
use scraper::{ElementRef, Html};

/// A parsed HTML page bound to the schema that locates its landmarks
///
/// The parsed tree is not `Send`; parse, extract and drop it without
/// holding it across an `.await`.
pub struct HtmlDocument<'s> {
    html: Html,
    schema: &'s SiteSchema,
}

impl<'s> HtmlDocument<'s> {
    /// Parse a full HTML document
    pub fn parse(body: &str, schema: &'s SiteSchema) -> Self {
        Self {
            html: Html::parse_document(body),
            schema,
        }
    }

    fn elements(&self, locator: &Locator) -> Vec<ElementRef<'_>> {
        for scope in &locator.scopes {
            let matched: Vec<ElementRef<'_>> = self.html.select(scope).collect();
            if matched.is_empty() {
                continue;
            }
            return match &locator.target {
                Some(target) => matched
                    .iter()
                    .flat_map(|element| element.select(target))
                    .collect(),
                None => matched,
            };
        }
        Vec::new()
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl MarkupDocument for HtmlDocument<'_> {
    fn texts(&self, landmark: Landmark) -> Vec<String> {
        self.elements(self.schema.locator(landmark))
            .iter()
            .map(element_text)
            .collect()
    }

    fn anchors(&self, landmark: Landmark) -> Vec<Anchor> {
        self.elements(self.schema.locator(landmark))
            .iter()
            .filter_map(|element| {
                let href = element.value().attr("href")?;
                Some(Anchor {
                    text: element_text(element),
                    href: href.to_string(),
                })
            })
            .collect()
    }

    fn rows(&self, landmark: Landmark) -> Vec<(String, String)> {
        self.elements(self.schema.locator(landmark))
            .iter()
            .filter_map(|row| {
                let label = row.select(&self.schema.row_label).next()?;
                let value = row.select(&self.schema.row_value).next()?;
                Some((element_text(&label), element_text(&value)))
            })
            .collect()
    }
}
