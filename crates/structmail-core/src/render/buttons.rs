//! Action buttons shown on rendered cards.

use serde_json::Value;
use structmail_mime::encoding::encode_base64url;
use url::form_urlencoded;

use crate::dispatch::Scheme;
use crate::payload::{StructuredObject, object_type, string_property, value_text};

/// One interactive control on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    /// Text label; cards fall back to the icon when absent.
    pub label: Option<String>,
    /// Material icon name.
    pub icon: Option<String>,
    /// URI activated by the button.
    pub target: String,
}

impl ActionButton {
    /// Creates a button with a text label.
    #[must_use]
    pub fn labelled(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            icon: None,
            target: target.into(),
        }
    }

    /// Creates an icon-only button.
    #[must_use]
    pub fn icon(icon: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: None,
            icon: Some(icon.into()),
            target: target.into(),
        }
    }

    /// Adds an icon to the button.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Base64url of the compact JSON text of an object.
pub(crate) fn encode_object(object: &StructuredObject) -> String {
    encode_base64url(Value::Object(object.clone()).to_string().as_bytes())
}

/// The "forward as mail" button every card carries.
#[must_use]
pub fn share_as_mail_button(object: &StructuredObject) -> ActionButton {
    ActionButton::icon(
        "forward_to_inbox",
        format!("{}://{}", Scheme::XShareAsMail.token(), encode_object(object)),
    )
}

/// Derives the buttons for a structured object.
///
/// Explicit `potentialAction`s come first, followed by buttons inferred
/// from the object's type and properties.
#[must_use]
pub fn buttons_for(object: &StructuredObject) -> Vec<ActionButton> {
    let mut buttons = Vec::new();

    match object.get("potentialAction") {
        Some(Value::Object(action)) => push_potential_action(action, &mut buttons),
        Some(Value::Array(actions)) => {
            for action in actions.iter().filter_map(Value::as_object) {
                push_potential_action(action, &mut buttons);
            }
        }
        _ => {}
    }

    if let Some(url) = object.get("url").filter(|url| !url.is_null()) {
        buttons.push(ActionButton::icon("open_in_browser", value_text(url)));
    }

    let kind = object_type(object).unwrap_or_default();

    if kind == "Recipe" || kind.ends_with("Reservation") {
        let file_name = format!("{}.json", string_property(object, "name").unwrap_or(kind));
        let file_name: String = form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
        buttons.push(ActionButton::icon(
            "share",
            format!(
                "{}://{}?fileName={file_name}",
                Scheme::XShareAsFile.token(),
                encode_object(object)
            ),
        ));
    }

    if kind.ends_with("Event") || has_schedule(object) {
        buttons.push(ActionButton::icon(
            "event",
            format!(
                "{}://{}",
                Scheme::XShareAsCalendar.token(),
                encode_object(object)
            ),
        ));
    }

    let mut phones = Vec::new();
    find_all(object, "telephone", &mut phones);
    for phone in phones.into_iter().filter_map(Value::as_str) {
        buttons.push(ActionButton::icon("call", format!("tel:{phone}")));
    }

    let mut geos = Vec::new();
    find_all(object, "geo", &mut geos);
    for geo in geos.into_iter().filter_map(Value::as_object) {
        if let (Some(lat), Some(lon)) = (geo.get("latitude"), geo.get("longitude")) {
            let (lat, lon) = (value_text(lat), value_text(lon));
            buttons.push(ActionButton::icon(
                "assistant_direction",
                format!("google.navigation:q={lat},{lon}"),
            ));
            buttons.push(ActionButton::icon("map", format!("geo:{lat},{lon}")));
        }
    }

    buttons.push(share_as_mail_button(object));

    if let Some((_, rest)) = string_property(object, "liveUri").and_then(|uri| uri.split_once(':'))
    {
        buttons.push(ActionButton::icon(
            "replay",
            format!("{}:{rest}", Scheme::XReload.token()),
        ));
    }

    buttons
}

fn push_potential_action(action: &StructuredObject, buttons: &mut Vec<ActionButton>) {
    match object_type(action).unwrap_or_default() {
        "CopyToClipboardAction" => {
            if let Some(description) = string_property(action, "description") {
                let label = string_property(action, "name").unwrap_or("Copy to clipboard");
                buttons.push(
                    ActionButton::labelled(
                        label,
                        format!(
                            "{}:{}",
                            Scheme::XClipboard.token(),
                            urlencoding::encode(description)
                        ),
                    )
                    .with_icon("content_paste"),
                );
            }
        }
        "ConfirmAction" => {
            if let Some(target) = string_property(action, "target") {
                let label = string_property(action, "name").unwrap_or("Confirm");
                buttons.push(ActionButton::labelled(label, target));
            }
        }
        "CancelAction" => {
            if let Some(target) = string_property(action, "target") {
                let label = string_property(action, "name").unwrap_or("Deny");
                buttons.push(ActionButton::labelled(label, target));
            }
        }
        _ => {}
    }
}

fn has_schedule(object: &StructuredObject) -> bool {
    ["startDate", "startTime", "endDate", "endTime"]
        .iter()
        .any(|key| string_property(object, key).is_some())
}

/// Collects every value stored under `key`, searching nested objects and
/// arrays of objects. Matched values are not searched further.
fn find_all<'a>(object: &'a StructuredObject, key: &str, found: &mut Vec<&'a Value>) {
    for (name, value) in object {
        if name == key {
            found.push(value);
            continue;
        }
        match value {
            Value::Object(nested) => find_all(nested, key, found),
            Value::Array(items) => {
                for nested in items.iter().filter_map(Value::as_object) {
                    find_all(nested, key, found);
                }
            }
            _ => {}
        }
    }
}
