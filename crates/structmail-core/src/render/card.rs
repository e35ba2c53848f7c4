//! Default material-design card renderer.

use askama::Template;
use serde_json::Value;

use super::{ActionButton, RenderError, TemplateRenderer};
use crate::payload::{StructuredObject, object_type, string_property};

/// Button as seen by the card template.
struct CardButton {
    href: String,
    text: String,
    is_icon: bool,
}

#[derive(Template)]
#[template(path = "card.html")]
struct CardTemplate<'a> {
    title: &'a str,
    subtitle: &'a str,
    thumbnail: &'a str,
    buttons: Vec<CardButton>,
}

/// Renders objects as material-design cards.
///
/// The title is the object's `name`, falling back to its `@type`; the
/// `description` becomes the subtitle. All values are HTML-escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardRenderer;

impl CardRenderer {
    /// Creates a new card renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for CardRenderer {
    fn render(
        &self,
        object: &StructuredObject,
        buttons: &[ActionButton],
    ) -> Result<String, RenderError> {
        let title = string_property(object, "name")
            .or_else(|| object_type(object))
            .ok_or_else(|| {
                RenderError::MalformedInput("object has neither @type nor name".to_string())
            })?;

        let buttons: Vec<CardButton> = buttons
            .iter()
            .map(|button| match (&button.label, &button.icon) {
                (Some(label), _) => CardButton {
                    href: button.target.clone(),
                    text: label.clone(),
                    is_icon: false,
                },
                (None, icon) => CardButton {
                    href: button.target.clone(),
                    text: icon.clone().unwrap_or_else(|| "open_in_new".to_string()),
                    is_icon: true,
                },
            })
            .collect();

        let template = CardTemplate {
            title,
            subtitle: string_property(object, "description").unwrap_or_default(),
            thumbnail: thumbnail(object).unwrap_or_default(),
            buttons,
        };

        Ok(template.render()?)
    }
}

fn thumbnail(object: &StructuredObject) -> Option<&str> {
    string_property(object, "thumbnailUrl")
        .or_else(|| string_property(object, "thumbnail"))
        .or_else(|| match object.get("image") {
            Some(Value::String(url)) => Some(url.as_str()),
            Some(Value::Array(images)) => images.iter().find_map(Value::as_str),
            _ => None,
        })
        .filter(|url| !url.is_empty())
}
