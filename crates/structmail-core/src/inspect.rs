//! Structured view of received messages.
//!
//! [`MessageInspector`] gathers the structured data a message carries,
//! either in its HTML body or in dedicated `application/ld+json` parts,
//! and renders it as cards with the buttons derived for each object.
//! Calendar attachments and verification codes in the body are turned
//! into objects too.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{Html, Node};
use serde_json::{Value, json};
use structmail_mime::encoding::encode_base64url;
use structmail_mime::{LD_JSON, Message, Part};

use crate::dispatch::{CalendarEvent, Scheme};
use crate::extract::{ExtractedItem, StructuredDataExtractor, Syntax, extract_json_str};
use crate::payload::{StructuredObject, object_type};
use crate::render::{
    ActionButton, RenderReport, TemplateRenderer, buttons_for, card_page, render_each,
};

const CALENDAR_MIME_TYPE: &str = "text/calendar";

static HTTPS_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https://[^\s<>"'`^{}|\\]+"#).ok());

static BOLD_CODE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<b>([0-9]{4,})</b>").ok());

/// Result of inspecting one message.
#[derive(Debug, Default)]
pub struct Inspection {
    /// Structured objects found, in document order.
    pub items: Vec<ExtractedItem>,
    /// Rendered cards and the objects that failed to render.
    pub report: RenderReport,
    /// "Load Cards" link offered when the message has no structured data
    /// but mentions web pages.
    pub load_cards_link: Option<String>,
}

impl Inspection {
    /// Returns `true` if there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.report.is_empty() && self.load_cards_link.is_none()
    }

    /// Standalone HTML page with the link and the cards.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut fragments = Vec::with_capacity(self.report.fragments.len() + 1);
        if let Some(link) = &self.load_cards_link {
            fragments.push(link.clone());
        }
        fragments.extend(self.report.fragments.iter().cloned());
        card_page(&fragments)
    }
}

/// Extracts and renders the structured data of received messages.
#[derive(Clone)]
pub struct MessageInspector {
    extractor: Arc<dyn StructuredDataExtractor>,
    renderer: Arc<dyn TemplateRenderer>,
    skip_types: Vec<String>,
    show_source: bool,
}

impl std::fmt::Debug for MessageInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageInspector")
            .field("skip_types", &self.skip_types)
            .field("show_source", &self.show_source)
            .finish_non_exhaustive()
    }
}

impl MessageInspector {
    /// Creates an inspector.
    ///
    /// Objects whose type is in `skip_types` are left out when a message
    /// carries more than one object.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn StructuredDataExtractor>,
        renderer: Arc<dyn TemplateRenderer>,
        skip_types: Vec<String>,
    ) -> Self {
        Self {
            extractor,
            renderer,
            skip_types,
            show_source: false,
        }
    }

    /// Adds a "Show source" button to every card.
    #[must_use]
    pub const fn with_show_source(mut self, show_source: bool) -> Self {
        self.show_source = show_source;
        self
    }

    /// Inspects a parsed message.
    #[must_use]
    pub fn inspect(&self, message: &Message) -> Inspection {
        let html = message.html_part().ok();
        let mut items = html
            .as_deref()
            .map(|html| self.extractor.extract_with_fallback(html))
            .unwrap_or_default();
        for part in message.parts_of_type(LD_JSON) {
            match part.body_text() {
                Ok(text) => items.extend(extract_json_str(&text)),
                Err(e) => tracing::warn!("Unreadable structured part: {}", e),
            }
        }
        if message.parts.is_empty() {
            if let Ok(text) = message.text_of_type(LD_JSON) {
                items.extend(extract_json_str(&text));
            }
        }
        items.extend(
            message
                .parts
                .iter()
                .filter(|part| is_calendar(part))
                .filter_map(calendar_item),
        );

        if items.len() > 1 {
            items.retain(|item| {
                !object_type(&item.object)
                    .is_some_and(|kind| self.skip_types.iter().any(|skip| skip == kind))
            });
        }

        let mentions_code = message
            .decoded_subject()
            .is_some_and(|subject| subject.to_lowercase().contains("code"));
        if mentions_code {
            let text = message.text_part().ok();
            if let Some(object) = verification_code_object(html.as_deref(), text.as_deref()) {
                items.push(ExtractedItem::new(Syntax::JsonLd, object));
            }
        }

        let report = render_each(
            self.renderer.as_ref(),
            items.iter().map(|item| &item.object),
            |object| {
                let mut buttons = buttons_for(object);
                if self.show_source {
                    buttons.push(show_source_button(object));
                }
                buttons
            },
        );

        let load_cards_link = if items.is_empty() {
            let text = message.text_part().unwrap_or_default();
            let mut urls = find_https_urls(&text);
            for url in find_html_urls(html.as_deref().unwrap_or_default()) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
            load_cards_link(&urls)
        } else {
            None
        };

        tracing::debug!(
            "Inspected message: {} object(s), {} card(s)",
            items.len(),
            report.fragments.len()
        );
        Inspection {
            items,
            report,
            load_cards_link,
        }
    }
}

fn show_source_button(object: &StructuredObject) -> ActionButton {
    let pretty = serde_json::to_string_pretty(&Value::Object(object.clone())).unwrap_or_default();
    ActionButton::labelled(
        "Show source",
        format!(
            "{}://{}",
            Scheme::XShowSource.token(),
            encode_base64url(pretty.as_bytes())
        ),
    )
    .with_icon("data_object")
}

/// Builds the `xloadcards:` link for a list of URLs.
#[must_use]
pub fn load_cards_link(urls: &[String]) -> Option<String> {
    if urls.is_empty() {
        return None;
    }
    let encoded: Vec<String> = urls
        .iter()
        .map(|url| encode_base64url(url.as_bytes()))
        .collect();
    Some(format!(
        "<a href=\"{}:{}\">Load Cards</a><br><hr><br><br>",
        Scheme::XLoadCards.token(),
        encoded.join(",")
    ))
}

fn is_calendar(part: &Part) -> bool {
    part.content_type().is_ok_and(|ct| ct.is(CALENDAR_MIME_TYPE))
        || part
            .file_name()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".ics"))
}

/// The first event of a calendar attachment as an `Event` object.
fn calendar_item(part: &Part) -> Option<ExtractedItem> {
    let text = match part.body_text() {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Unreadable calendar attachment: {}", e);
            return None;
        }
    };
    let Some(event) = CalendarEvent::from_ics(&text) else {
        tracing::debug!("Calendar attachment without event");
        return None;
    };
    Some(ExtractedItem::new(Syntax::JsonLd, event.to_object()))
}

/// A card offering to copy a code set in bold in the HTML body.
///
/// The code must also occur in the plain text.
fn verification_code_object(html: Option<&str>, text: Option<&str>) -> Option<StructuredObject> {
    let captures = BOLD_CODE.as_ref()?.captures(html?)?;
    let code = captures.get(1)?.as_str();
    if !text?.contains(code) {
        return None;
    }
    tracing::debug!("Derived verification code card");
    match json!({
        "@context": "https://schema.org",
        "@type": "EmailMessage",
        "description": format!("Confirmation code: {code}"),
        "potentialAction": {
            "@type": "CopyToClipboardAction",
            "name": code,
            "description": code
        }
    }) {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

/// Finds distinct `https://` URLs in text, in order of appearance.
fn find_https_urls(text: &str) -> Vec<String> {
    let mut urls = Vec::new();
    push_https_urls(text, &mut urls);
    urls
}

/// Finds distinct `https://` URLs in the text and links of an HTML
/// document, with character references resolved.
fn find_html_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();
    for node in document.root_element().descendants() {
        match node.value() {
            Node::Text(text) => push_https_urls(text, &mut urls),
            Node::Element(element) => {
                if let Some(href) = element.attr("href") {
                    push_https_urls(href, &mut urls);
                }
            }
            _ => {}
        }
    }
    urls
}

fn push_https_urls(text: &str, urls: &mut Vec<String>) {
    let Some(pattern) = HTTPS_URL.as_ref() else {
        return;
    };
    for found in pattern.find_iter(text) {
        let url = trim_url(found.as_str());
        if url.len() > "https://".len() && !urls.iter().any(|known| known == url) {
            urls.push(url.to_string());
        }
    }
}

/// Drops trailing punctuation and closing brackets that have no opening
/// partner inside the URL.
fn trim_url(mut url: &str) -> &str {
    loop {
        let trimmed = url.trim_end_matches(['.', ',', ';', ':', '!', '?', '*']);
        let trimmed = match trimmed.chars().next_back() {
            Some(close @ (')' | ']')) => {
                let open = if close == ')' { '(' } else { '[' };
                if trimmed.matches(close).count() > trimmed.matches(open).count() {
                    &trimmed[..trimmed.len() - 1]
                } else {
                    trimmed
                }
            }
            _ => trimmed,
        };
        if trimmed.len() == url.len() {
            return url;
        }
        url = trimmed;
    }
}
