//! SML payload encoder.
//!
//! Turns a [`StructuredPayload`] into the bodies of an outgoing message:
//! a plain-text fallback, an HTML body of rendered cards and, for the
//! dedicated-part layout, an `application/ld+json` alternative.

use std::sync::Arc;

use chrono::Local;
use structmail_mime::encoding::to_crlf;
use structmail_mime::{ContentType, Part, TransferEncoding};

use crate::assemble::{ComposedMessageBuilder, MessageFormat};
use crate::error::{Error, Result};
use crate::payload::{SmlVariant, StructuredPayload};
use crate::render::{RenderReport, TemplateRenderer, render_each};

/// Opening of an HTML body without embedded data.
pub const HTML_START: &str = "<!DOCTYPE html><html><head></head><body>";

/// Closing of every generated HTML body.
pub const HTML_END: &str = "</body></html>";

/// Plain-text body used when none is supplied.
pub const DEFAULT_PLAIN_TEXT: &str = "This email contains SML content";

/// Settings read by the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerSettings {
    /// Write the `Date` header in UTC.
    pub hide_timezone: bool,
    /// Plain-text body used when the caller supplies none.
    pub plain_text_fallback: String,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            hide_timezone: false,
            plain_text_fallback: DEFAULT_PLAIN_TEXT.to_string(),
        }
    }
}

/// Encodes structured payloads into message builders.
#[derive(Clone)]
pub struct SmlComposer {
    renderer: Arc<dyn TemplateRenderer>,
    settings: ComposerSettings,
}

impl std::fmt::Debug for SmlComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmlComposer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SmlComposer {
    /// Creates a composer rendering cards with `renderer`.
    #[must_use]
    pub fn new(renderer: Arc<dyn TemplateRenderer>, settings: ComposerSettings) -> Self {
        Self { renderer, settings }
    }

    /// Returns the composer settings.
    #[must_use]
    pub const fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Composes the bodies of a structured message.
    ///
    /// `html_body`, when given, is used verbatim and no card is rendered.
    /// Otherwise each object is rendered on its own; objects that fail
    /// are dropped. When `builder` is given its recipients, subject and
    /// identity are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPayload`] for an empty payload, or a
    /// serialization error if the payload cannot be written as JSON.
    pub fn compose(
        &self,
        payload: &StructuredPayload,
        variant: SmlVariant,
        html_body: Option<&str>,
        plain_text: Option<&str>,
        builder: Option<ComposedMessageBuilder>,
    ) -> Result<ComposedMessageBuilder> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        let json = payload.canonical_json()?;

        let html = match html_body {
            Some(html) => html.to_string(),
            None => {
                let fragments = self.render_cards(payload).joined();
                match variant {
                    SmlVariant::EmbeddedInHtml => format!(
                        "<!DOCTYPE html><html><head><script type=\"application/ld+json\">{json}</script></head><body>{fragments}{HTML_END}"
                    ),
                    SmlVariant::DedicatedPart => format!("{HTML_START}{fragments}{HTML_END}"),
                }
            }
        };

        let plain = plain_text.unwrap_or(&self.settings.plain_text_fallback);

        let builder = builder
            .unwrap_or_default()
            .sent_date(Local::now().fixed_offset())
            .hide_timezone(self.settings.hide_timezone)
            .format(MessageFormat::Html)
            .plain_text(to_crlf(plain))
            .html_text(to_crlf(&html));

        let builder = match variant {
            SmlVariant::DedicatedPart => builder.alternate_part(Part::text(
                &ContentType::ld_json(),
                TransferEncoding::EightBit,
                &to_crlf(&json),
            )),
            SmlVariant::EmbeddedInHtml => builder.without_alternate_part(),
        };

        tracing::debug!(
            "Composed {} structured object(s) as {}",
            payload.len(),
            variant
        );
        Ok(builder)
    }

    /// Renders each payload object into a card without buttons.
    #[must_use]
    pub fn render_cards(&self, payload: &StructuredPayload) -> RenderReport {
        render_each(self.renderer.as_ref(), payload, |_| Vec::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payload::StructuredObject;
    use crate::render::{ActionButton, RenderError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl TemplateRenderer for CountingRenderer {
        fn render(
            &self,
            object: &StructuredObject,
            _buttons: &[ActionButton],
        ) -> std::result::Result<String, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match object.get("name").and_then(|v| v.as_str()) {
                Some("broken") => Err(RenderError::MalformedInput("broken".into())),
                Some(name) => Ok(format!("<div>{name}\n</div>")),
                None => Ok("<div></div>".to_string()),
            }
        }
    }

    fn payload(values: &[serde_json::Value]) -> StructuredPayload {
        values
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn composer(renderer: Arc<CountingRenderer>) -> SmlComposer {
        SmlComposer::new(renderer, ComposerSettings::default())
    }

    #[test]
    fn test_empty_payload_rejected() {
        let composer = composer(Arc::default());
        let result = composer.compose(
            &StructuredPayload::default(),
            SmlVariant::DedicatedPart,
            None,
            None,
            None,
        );
        assert!(matches!(result, Err(Error::EmptyPayload)));
    }

    #[test]
    fn test_html_body_skips_renderer() {
        let renderer = Arc::new(CountingRenderer::default());
        let composer = composer(Arc::clone(&renderer));
        let builder = composer
            .compose(
                &payload(&[json!({"name": "a"}), json!({"name": "b"})]),
                SmlVariant::EmbeddedInHtml,
                Some("<p>mine</p>"),
                None,
                None,
            )
            .unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(builder.html_text_body(), Some("<p>mine</p>"));
    }

    #[test]
    fn test_embedded_layout() {
        let composer = composer(Arc::default());
        let data = payload(&[json!({"@type": "Event", "name": "gig"})]);
        let builder = composer
            .compose(&data, SmlVariant::EmbeddedInHtml, None, None, None)
            .unwrap();

        let json = to_crlf(&data.canonical_json().unwrap());
        let expected = format!(
            "<!DOCTYPE html><html><head><script type=\"application/ld+json\">{json}</script></head><body><div>gig\r\n</div></body></html>"
        );
        assert_eq!(builder.html_text_body(), Some(expected.as_str()));
        assert!(builder.alternate().is_none());
        assert_eq!(builder.plain_text_body(), DEFAULT_PLAIN_TEXT);
    }

    #[test]
    fn test_dedicated_layout_and_failures_dropped() {
        let renderer = Arc::new(CountingRenderer::default());
        let composer = composer(Arc::clone(&renderer));
        let data = payload(&[
            json!({"name": "one"}),
            json!({"name": "broken"}),
            json!({"name": "two"}),
        ]);
        let builder = composer
            .compose(
                &data,
                SmlVariant::DedicatedPart,
                None,
                Some("line1\nline2"),
                None,
            )
            .unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            builder.html_text_body(),
            Some("<!DOCTYPE html><html><head></head><body><div>one\r\n</div>\r\n<div>two\r\n</div></body></html>")
        );
        assert_eq!(builder.plain_text_body(), "line1\r\nline2");

        let part = builder.alternate().unwrap();
        assert!(part.content_type().unwrap().is("application/ld+json"));
        assert_eq!(part.content_type().unwrap().charset(), Some("utf-8"));
        assert_eq!(part.transfer_encoding(), TransferEncoding::EightBit);
        let body = part.body_text().unwrap();
        assert!(body.starts_with('['));
        assert!(body.contains("\r\n"));
        assert!(!body.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_existing_builder_keeps_recipients() {
        let composer = composer(Arc::default());
        let draft = ComposedMessageBuilder::new()
            .to(vec!["bob@example.org".to_string()])
            .subject("Hello");
        let builder = composer
            .compose(
                &payload(&[json!({"name": "x"})]),
                SmlVariant::DedicatedPart,
                None,
                None,
                Some(draft),
            )
            .unwrap();
        assert_eq!(builder.all_recipients(), vec!["bob@example.org"]);
        assert!(builder.sent().is_some());
    }

    #[test]
    fn test_hide_timezone_comes_from_settings() {
        let composer = SmlComposer::new(
            Arc::new(CountingRenderer::default()),
            ComposerSettings {
                hide_timezone: true,
                ..ComposerSettings::default()
            },
        );
        let builder = composer
            .compose(
                &payload(&[json!({"name": "x"})]),
                SmlVariant::DedicatedPart,
                None,
                None,
                None,
            )
            .unwrap();
        assert!(builder.hides_timezone());
    }
}
