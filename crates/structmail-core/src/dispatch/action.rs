//! Action URI parsing.

use std::borrow::Cow;
use std::fmt;
use std::string::FromUtf8Error;

use structmail_mime::encoding::decode_base64url;
use thiserror::Error;
use url::form_urlencoded;

use crate::payload::StructuredObject;

/// Errors decoding the payload of an action URI.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The URI carries no payload.
    #[error("missing payload")]
    MissingPayload,

    /// The payload is not valid base64url.
    #[error("invalid base64url payload: {0}")]
    Base64(#[from] structmail_mime::Error),

    /// The decoded payload is not UTF-8.
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// The decoded payload is not a JSON object.
    #[error("payload is not a JSON object: {0}")]
    Json(String),

    /// A `mailto:` path is not exactly one plain address.
    #[error("invalid recipient: {0:?}")]
    Recipient(String),
}

/// URI schemes understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Inline attachment reference.
    Cid,
    /// Legacy local file link.
    File,
    /// Mail link, possibly carrying an approve/deny action.
    Mailto,
    /// Share a JSON payload as a file.
    XShareAsFile,
    /// Export an event payload to the calendar.
    XShareAsCalendar,
    /// Forward a payload as a new structured mail.
    XShareAsMail,
    /// Fetch pages and show their structured data as cards.
    XLoadCards,
    /// Fire-and-forget request.
    XRequest,
    /// Reload live structured data.
    XReload,
    /// Show a barcode.
    XBarcode,
    /// Show payload source.
    XShowSource,
    /// Evaluate a script in the view.
    XJs,
    /// Show an alert.
    XAlert,
    /// Copy text to the clipboard.
    XClipboard,
    /// Anything else; opened externally.
    Other,
}

impl Scheme {
    /// Maps a (lower-case) scheme token to a scheme.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "cid" => Self::Cid,
            "file" => Self::File,
            "mailto" => Self::Mailto,
            "xshareasfile" => Self::XShareAsFile,
            "xshareascalendar" => Self::XShareAsCalendar,
            "xshareasmail" => Self::XShareAsMail,
            "xloadcards" => Self::XLoadCards,
            "xrequest" => Self::XRequest,
            "xreload" => Self::XReload,
            "xbarcode" => Self::XBarcode,
            "xshowsource" => Self::XShowSource,
            "xjs" => Self::XJs,
            "xalert" => Self::XAlert,
            "xclipboard" => Self::XClipboard,
            _ => Self::Other,
        }
    }

    /// Returns the scheme token (empty for [`Scheme::Other`]).
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Cid => "cid",
            Self::File => "file",
            Self::Mailto => "mailto",
            Self::XShareAsFile => "xshareasfile",
            Self::XShareAsCalendar => "xshareascalendar",
            Self::XShareAsMail => "xshareasmail",
            Self::XLoadCards => "xloadcards",
            Self::XRequest => "xrequest",
            Self::XReload => "xreload",
            Self::XBarcode => "xbarcode",
            Self::XShowSource => "xshowsource",
            Self::XJs => "xjs",
            Self::XAlert => "xalert",
            Self::XClipboard => "xclipboard",
            Self::Other => "",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A parsed action URI.
///
/// Parsing never fails; text without a valid scheme yields
/// [`Scheme::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionUri {
    raw: String,
    scheme: String,
    specific: String,
    authority: Option<String>,
    path: String,
    query: Option<String>,
}

impl ActionUri {
    /// Parses a URI.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (scheme, specific) = match raw.split_once(':') {
            Some((scheme, rest)) if is_scheme(scheme) => (scheme.to_ascii_lowercase(), rest),
            _ => (String::new(), raw),
        };

        let without_fragment = specific.split_once('#').map_or(specific, |(head, _)| head);
        let (hierarchy, query) = match without_fragment.split_once('?') {
            Some((hierarchy, query)) => (hierarchy, Some(query.to_string())),
            None => (without_fragment, None),
        };

        let (authority, path) = match hierarchy.strip_prefix("//") {
            Some(rest) => {
                let end = rest.find('/').unwrap_or(rest.len());
                (Some(rest[..end].to_string()), rest[end..].to_string())
            }
            None => (None, hierarchy.to_string()),
        };

        Self {
            raw: raw.to_string(),
            scheme,
            specific: specific.to_string(),
            authority,
            path,
            query,
        }
    }

    /// The URI as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lower-case scheme token (empty if there is none).
    #[must_use]
    pub fn scheme_token(&self) -> &str {
        &self.scheme
    }

    /// The scheme kind.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        Scheme::from_token(&self.scheme)
    }

    /// Authority (`//authority/...`) if present.
    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Path, or the opaque part for URIs without authority.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Percent-decoded part after the scheme, without fragment.
    #[must_use]
    pub fn scheme_specific_part(&self) -> String {
        let without_fragment = self
            .specific
            .split_once('#')
            .map_or(self.specific.as_str(), |(head, _)| head);
        percent_decode(without_fragment).into_owned()
    }

    /// The encoded payload: the authority when present, else the path.
    #[must_use]
    pub fn payload(&self) -> &str {
        match self.authority.as_deref() {
            Some(authority) if !authority.is_empty() => authority,
            _ => &self.path,
        }
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        form_urlencoded::parse(self.query.as_deref()?.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// The same URI with its scheme replaced.
    #[must_use]
    pub fn with_scheme(&self, scheme: &str) -> String {
        format!("{scheme}:{}", self.specific)
    }
}

impl fmt::Display for ActionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_scheme(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Percent-decodes text, keeping it unchanged if the result is not UTF-8.
pub(crate) fn percent_decode(text: &str) -> Cow<'_, str> {
    urlencoding::decode(text).unwrap_or(Cow::Borrowed(text))
}

/// Percent-decodes a `mailto:` path into a single bare address.
///
/// # Errors
///
/// Returns [`DecodeError::Recipient`] for lists, display names, whitespace
/// or control characters, and anything without exactly one `@`.
pub fn decode_recipient(path: &str) -> Result<String, DecodeError> {
    let decoded = percent_decode(path);
    let address = decoded.trim();
    let plain = !address.contains(|c: char| {
        c.is_control() || c.is_whitespace() || matches!(c, ',' | ';' | '<' | '>' | '"')
    });
    match address.split_once('@') {
        Some((local, domain))
            if plain && !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(address.to_string())
        }
        _ => Err(DecodeError::Recipient(decoded.into_owned())),
    }
}

/// Decodes one base64url payload into bytes.
///
/// # Errors
///
/// Returns an error for empty or invalid payloads.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    if encoded.trim().is_empty() {
        return Err(DecodeError::MissingPayload);
    }
    Ok(decode_base64url(encoded)?)
}

/// Decodes one base64url payload into text.
///
/// # Errors
///
/// Returns an error for invalid base64url or non UTF-8 content.
pub fn decode_text(encoded: &str) -> Result<String, DecodeError> {
    Ok(String::from_utf8(decode_payload(encoded)?)?)
}

/// Decodes one base64url payload into a JSON object.
///
/// # Errors
///
/// Returns an error unless the payload decodes to a JSON object.
pub fn decode_object(encoded: &str) -> Result<StructuredObject, DecodeError> {
    let text = decode_text(encoded)?;
    match serde_json::from_str(&text) {
        Ok(serde_json::Value::Object(object)) => Ok(object),
        Ok(other) => Err(DecodeError::Json(format!("expected an object, found {other}"))),
        Err(e) => Err(DecodeError::Json(e.to_string())),
    }
}

/// Decodes a comma-separated list of base64url payloads into texts.
///
/// # Errors
///
/// Fails on the first invalid entry.
pub fn decode_text_list(encoded: &str) -> Result<Vec<String>, DecodeError> {
    encoded.split(',').map(decode_text).collect()
}
