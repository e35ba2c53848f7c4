//! Mutable draft of an outgoing message.

use chrono::{DateTime, FixedOffset};
use structmail_mime::Part;

use crate::account::Identity;

/// Body format of a composed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// Plain text only.
    Text,
    /// Plain text with an HTML alternative.
    #[default]
    Html,
}

/// Draft message filled by the composer and completed by the caller.
#[derive(Debug, Clone, Default)]
pub struct ComposedMessageBuilder {
    pub(crate) sent_date: Option<DateTime<FixedOffset>>,
    pub(crate) hide_timezone: bool,
    pub(crate) format: MessageFormat,
    pub(crate) plain_text: String,
    pub(crate) html_text: Option<String>,
    pub(crate) alternate_part: Option<Part>,
    pub(crate) to: Vec<String>,
    pub(crate) cc: Vec<String>,
    pub(crate) bcc: Vec<String>,
    pub(crate) reply_to: Vec<String>,
    pub(crate) subject: String,
    pub(crate) identity: Option<Identity>,
    pub(crate) is_draft: bool,
}

impl ComposedMessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sent date.
    #[must_use]
    pub const fn sent_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.sent_date = Some(date);
        self
    }

    /// Writes the `Date` header in UTC when set.
    #[must_use]
    pub const fn hide_timezone(mut self, hide: bool) -> Self {
        self.hide_timezone = hide;
        self
    }

    /// Sets the body format.
    #[must_use]
    pub const fn format(mut self, format: MessageFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn plain_text(mut self, text: impl Into<String>) -> Self {
        self.plain_text = text.into();
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_text(mut self, html: impl Into<String>) -> Self {
        self.html_text = Some(html.into());
        self
    }

    /// Sets an extra alternative part placed after the text bodies.
    #[must_use]
    pub fn alternate_part(mut self, part: Part) -> Self {
        self.alternate_part = Some(part);
        self
    }

    /// Removes the extra alternative part.
    #[must_use]
    pub fn without_alternate_part(mut self) -> Self {
        self.alternate_part = None;
        self
    }

    /// Replaces the `To` recipients.
    #[must_use]
    pub fn to(mut self, recipients: Vec<String>) -> Self {
        self.to = recipients;
        self
    }

    /// Replaces the `Cc` recipients.
    #[must_use]
    pub fn cc(mut self, recipients: Vec<String>) -> Self {
        self.cc = recipients;
        self
    }

    /// Replaces the `Bcc` recipients (never written to headers).
    #[must_use]
    pub fn bcc(mut self, recipients: Vec<String>) -> Self {
        self.bcc = recipients;
        self
    }

    /// Replaces the `Reply-To` addresses.
    #[must_use]
    pub fn reply_to(mut self, addresses: Vec<String>) -> Self {
        self.reply_to = addresses;
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the sender identity.
    #[must_use]
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Marks the message as a draft.
    #[must_use]
    pub const fn draft(mut self, is_draft: bool) -> Self {
        self.is_draft = is_draft;
        self
    }

    /// Returns the plain-text body.
    #[must_use]
    pub fn plain_text_body(&self) -> &str {
        &self.plain_text
    }

    /// Returns the HTML body if set.
    #[must_use]
    pub fn html_text_body(&self) -> Option<&str> {
        self.html_text.as_deref()
    }

    /// Returns the extra alternative part if set.
    #[must_use]
    pub const fn alternate(&self) -> Option<&Part> {
        self.alternate_part.as_ref()
    }

    /// Returns the body format.
    #[must_use]
    pub const fn message_format(&self) -> MessageFormat {
        self.format
    }

    /// Returns whether the `Date` header hides the local timezone.
    #[must_use]
    pub const fn hides_timezone(&self) -> bool {
        self.hide_timezone
    }

    /// Returns the sent date if set.
    #[must_use]
    pub const fn sent(&self) -> Option<DateTime<FixedOffset>> {
        self.sent_date
    }

    /// Returns every recipient (to, cc and bcc).
    #[must_use]
    pub fn all_recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
            .collect()
    }

    /// Returns the sender identity if set.
    #[must_use]
    pub const fn sender(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}
