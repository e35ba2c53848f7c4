//! Structured payload model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One schema.org style object: string keys, JSON values.
pub type StructuredObject = Map<String, Value>;

/// Layout used to carry the structured payload inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmlVariant {
    /// JSON-LD inside a `<script>` in the HTML head.
    EmbeddedInHtml,
    /// JSON-LD in its own `application/ld+json` alternative part.
    #[default]
    DedicatedPart,
}

impl SmlVariant {
    /// Returns the configuration name of the variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddedInHtml => "embedded-in-html",
            Self::DedicatedPart => "dedicated-part",
        }
    }
}

impl fmt::Display for SmlVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SmlVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded-in-html" | "embedded" | "html" => Ok(Self::EmbeddedInHtml),
            "dedicated-part" | "dedicated" | "part" => Ok(Self::DedicatedPart),
            other => Err(Error::Config(format!("unknown SML variant: {other}"))),
        }
    }
}

/// Ordered sequence of structured objects carried by one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredPayload {
    objects: Vec<StructuredObject>,
}

impl StructuredPayload {
    /// Creates a payload from objects in order.
    #[must_use]
    pub const fn new(objects: Vec<StructuredObject>) -> Self {
        Self { objects }
    }

    /// Creates a payload holding a single object.
    #[must_use]
    pub fn single(object: StructuredObject) -> Self {
        Self {
            objects: vec![object],
        }
    }

    /// Parses a JSON document holding one object or an array of objects.
    ///
    /// Non-object array entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or holds no object at all.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let objects = match serde_json::from_str::<Value>(text)? {
            Value::Object(object) => vec![object],
            Value::Array(values) => values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(object) => Some(object),
                    _ => None,
                })
                .collect(),
            other => {
                return Err(Error::InvalidPayload(format!(
                    "expected an object or array, found {other}"
                )));
            }
        };

        if objects.is_empty() {
            return Err(Error::EmptyPayload);
        }
        Ok(Self::new(objects))
    }

    /// Appends an object.
    pub fn push(&mut self, object: StructuredObject) {
        self.objects.push(object);
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the payload holds no object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the objects in order.
    #[must_use]
    pub fn objects(&self) -> &[StructuredObject] {
        &self.objects
    }

    /// Iterates over the objects in order.
    pub fn iter(&self) -> std::slice::Iter<'_, StructuredObject> {
        self.objects.iter()
    }

    /// Consumes the payload, returning its objects.
    #[must_use]
    pub fn into_inner(self) -> Vec<StructuredObject> {
        self.objects
    }

    /// Serializes the payload as carried on the wire.
    ///
    /// A single object is written on its own, several objects become a
    /// JSON array. Objects are pretty-printed with two-space indentation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPayload`] when there is nothing to encode.
    pub fn canonical_json(&self) -> Result<String> {
        match self.objects.as_slice() {
            [] => Err(Error::EmptyPayload),
            [object] => Ok(serde_json::to_string_pretty(object)?),
            objects => {
                let texts = objects
                    .iter()
                    .map(serde_json::to_string_pretty)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(format!("[{}]", texts.join(",")))
            }
        }
    }
}

impl From<Vec<StructuredObject>> for StructuredPayload {
    fn from(objects: Vec<StructuredObject>) -> Self {
        Self::new(objects)
    }
}

impl FromIterator<StructuredObject> for StructuredPayload {
    fn from_iter<I: IntoIterator<Item = StructuredObject>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StructuredPayload {
    type Item = &'a StructuredObject;
    type IntoIter = std::slice::Iter<'a, StructuredObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// Returns the first `@type` of an object.
///
/// `@type` may be a string or an array of strings.
#[must_use]
pub fn object_type(object: &StructuredObject) -> Option<&str> {
    match object.get("@type")? {
        Value::String(kind) => Some(kind.as_str()),
        Value::Array(kinds) => kinds.iter().find_map(Value::as_str),
        _ => None,
    }
}

/// Returns a string property, ignoring empty values.
#[must_use]
pub fn string_property<'a>(object: &'a StructuredObject, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Renders a scalar JSON value the way it would be concatenated into text.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
