//! Rendering structured objects into HTML card fragments.
//!
//! The [`TemplateRenderer`] trait is the seam; [`CardRenderer`] is the
//! default implementation and [`buttons_for`] derives the interactive
//! actions shown on a card.

mod buttons;
mod card;

pub use buttons::{ActionButton, buttons_for, share_as_mail_button};
pub use card::CardRenderer;

use thiserror::Error;

use crate::payload::StructuredObject;

/// Errors produced while rendering one object.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Reading template resources failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object lacks what the template needs.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The template engine failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Renders one structured object into an HTML fragment.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `object` with the given action buttons.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be rendered.
    fn render(
        &self,
        object: &StructuredObject,
        buttons: &[ActionButton],
    ) -> Result<String, RenderError>;
}

/// A render failure for the object at `index`.
#[derive(Debug)]
pub struct RenderFailure {
    /// Position of the object in the rendered sequence.
    pub index: usize,
    /// Why rendering failed.
    pub error: RenderError,
}

/// Per-item outcome of rendering a sequence of objects.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Fragments of the objects that rendered, in order.
    pub fragments: Vec<String>,
    /// Objects that failed and were dropped.
    pub failures: Vec<RenderFailure>,
}

impl RenderReport {
    /// Fragments joined with newlines.
    #[must_use]
    pub fn joined(&self) -> String {
        self.fragments.join("\n")
    }

    /// Returns `true` if nothing rendered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Renders every object, collecting failures instead of aborting.
pub fn render_each<'a, I, F>(renderer: &dyn TemplateRenderer, objects: I, buttons: F) -> RenderReport
where
    I: IntoIterator<Item = &'a StructuredObject>,
    F: Fn(&StructuredObject) -> Vec<ActionButton>,
{
    let mut report = RenderReport::default();
    for (index, object) in objects.into_iter().enumerate() {
        match renderer.render(object, &buttons(object)) {
            Ok(fragment) => report.fragments.push(fragment),
            Err(error) => {
                tracing::warn!("Dropping structured object {}: {}", index, error);
                report.failures.push(RenderFailure { index, error });
            }
        }
    }
    report
}

/// Wraps rendered cards into a standalone HTML page with card styling.
#[must_use]
pub fn card_page(fragments: &[String]) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head>",
            "<meta charset=\"utf-8\">",
            "<link href=\"https://unpkg.com/material-components-web@latest/dist/material-components-web.min.css\" rel=\"stylesheet\">",
            "<link rel=\"stylesheet\" href=\"https://fonts.googleapis.com/icon?family=Material+Icons\">",
            "<link rel=\"stylesheet\" href=\"https://fonts.googleapis.com/css?family=Roboto:300,400,500,600,700\">",
            "</head><body>{}</body></html>"
        ),
        fragments.join("\n")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NameOnly;

    impl TemplateRenderer for NameOnly {
        fn render(
            &self,
            object: &StructuredObject,
            buttons: &[ActionButton],
        ) -> Result<String, RenderError> {
            let name = object
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| RenderError::MalformedInput("no name".into()))?;
            Ok(format!("<p>{name}:{}</p>", buttons.len()))
        }
    }

    #[test]
    fn test_render_each_collects_failures() {
        let objects = [
            json!({"name": "a"}).as_object().cloned().unwrap(),
            json!({"@type": "Thing"}).as_object().cloned().unwrap(),
            json!({"name": "c"}).as_object().cloned().unwrap(),
        ];

        let report = render_each(&NameOnly, &objects, |_| Vec::new());
        assert_eq!(report.fragments, vec!["<p>a:0</p>", "<p>c:0</p>"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.joined(), "<p>a:0</p>\n<p>c:0</p>");
    }

    #[test]
    fn test_card_page_wraps_fragments() {
        let page = card_page(&["<div>1</div>".to_string(), "<div>2</div>".to_string()]);
        assert!(page.starts_with("<!DOCTYPE html><html><head>"));
        assert!(page.ends_with("<body><div>1</div>\n<div>2</div></body></html>"));
    }
}
