//! `Content-Type` values.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Media type of the dedicated structured-data part.
pub const LD_JSON: &str = "application/ld+json";

/// Characters forcing a parameter value into quotes (RFC 2045 tspecials).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// A media type plus its parameters, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    essence: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    fn of(essence: &str) -> Self {
        Self {
            essence: essence.to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    /// `text/plain; charset=utf-8`
    #[must_use]
    pub fn text_plain() -> Self {
        Self::of("text/plain").with_parameter("charset", "utf-8")
    }

    /// `text/html; charset=utf-8`
    #[must_use]
    pub fn text_html() -> Self {
        Self::of("text/html").with_parameter("charset", "utf-8")
    }

    /// `application/ld+json; charset=utf-8`, the structured-data part.
    #[must_use]
    pub fn ld_json() -> Self {
        Self::of(LD_JSON).with_parameter("charset", "utf-8")
    }

    /// `multipart/alternative` separated by `boundary`.
    #[must_use]
    pub fn multipart_alternative(boundary: impl Into<String>) -> Self {
        Self::of("multipart/alternative").with_parameter("boundary", boundary)
    }

    /// Sets a parameter, replacing any value under the same name.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        if let Some(slot) = self.params.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.params.push((name, value));
        }
        self
    }

    /// Looks a parameter up by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// The `boundary` parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// `type/subtype`, lowercased, without parameters.
    #[must_use]
    pub fn mime_type(&self) -> String {
        self.essence.clone()
    }

    /// Whether the media type equals `mime_type`, ignoring case.
    #[must_use]
    pub fn is(&self, mime_type: &str) -> bool {
        self.essence.eq_ignore_ascii_case(mime_type.trim())
    }

    /// Whether this is any `multipart/*` type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }

    /// Reads `type/subtype; name=value; name="quoted value"`.
    ///
    /// Parameters without `=` are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the media type is empty or lacks a subtype.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = text.split(';');
        let essence = segments.next().map_or("", str::trim);
        match essence.split_once('/') {
            Some((kind, sub)) if !kind.trim().is_empty() && !sub.trim().is_empty() => {}
            _ => return Err(Error::ContentType(text.to_string())),
        }

        let mut content_type = Self::of(&essence.replace(' ', ""));
        for segment in segments {
            if let Some((name, value)) = segment.split_once('=') {
                content_type = content_type.with_parameter(name.trim(), value.trim().trim_matches('"'));
            }
        }
        Ok(content_type)
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence)?;
        for (name, value) in &self.params {
            let quote = value.is_empty()
                || value.contains(|c: char| c.is_ascii_whitespace() || TSPECIALS.contains(c));
            if quote {
                write!(f, "; {name}=\"{value}\"")?;
            } else {
                write!(f, "; {name}={value}")?;
            }
        }
        Ok(())
    }
}
