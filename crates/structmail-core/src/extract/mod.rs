//! Structured data extraction from HTML documents.
//!
//! Two syntaxes are supported: JSON-LD `<script>` blocks and Microdata
//! `itemscope` trees. Extraction never fails; malformed markup yields no
//! items.

mod jsonld;
mod microdata;

pub use jsonld::extract_json_str;

use serde::{Deserialize, Serialize};

use crate::payload::StructuredObject;

/// Markup syntax a structured object was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Syntax {
    /// `<script type="application/ld+json">`.
    JsonLd,
    /// `itemscope` / `itemprop` attributes.
    Microdata,
}

/// One structured object found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    /// Syntax the object was written in.
    pub syntax: Syntax,
    /// The parsed object.
    pub object: StructuredObject,
}

impl ExtractedItem {
    /// Creates a new extracted item.
    #[must_use]
    pub const fn new(syntax: Syntax, object: StructuredObject) -> Self {
        Self { syntax, object }
    }
}

/// Finds structured objects in HTML.
pub trait StructuredDataExtractor: Send + Sync {
    /// Extracts every object written in `syntax`.
    fn extract(&self, html: &str, syntax: Syntax) -> Vec<ExtractedItem>;

    /// Extracts JSON-LD, falling back to Microdata when none is found.
    fn extract_with_fallback(&self, html: &str) -> Vec<ExtractedItem> {
        let items = self.extract(html, Syntax::JsonLd);
        if items.is_empty() {
            self.extract(html, Syntax::Microdata)
        } else {
            items
        }
    }
}

/// Extractor backed by the `scraper` HTML parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StructuredDataExtractor for HtmlExtractor {
    fn extract(&self, html: &str, syntax: Syntax) -> Vec<ExtractedItem> {
        let document = scraper::Html::parse_document(html);
        let objects = match syntax {
            Syntax::JsonLd => jsonld::extract(&document),
            Syntax::Microdata => microdata::extract(&document),
        };
        tracing::debug!("Extracted {} {:?} item(s)", objects.len(), syntax);
        objects
            .into_iter()
            .map(|object| ExtractedItem::new(syntax, object))
            .collect()
    }
}
