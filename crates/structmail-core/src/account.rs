//! Account and sender identity model.

use serde::{Deserialize, Serialize};
use structmail_mime::encoding::encode_rfc2047;

use crate::payload::SmlVariant;

/// A sender identity of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name (may be empty).
    pub name: String,
    /// Email address.
    pub email: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Formats the identity as an RFC 5322 mailbox for the `From` header.
    #[must_use]
    pub fn mailbox(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            return self.email.clone();
        }

        if !name.is_ascii() {
            return format!("{} <{}>", encode_rfc2047(name, "utf-8"), self.email);
        }

        if name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{}>", self.email)
        } else {
            format!("{name} <{}>", self.email)
        }
    }

    /// Returns the domain part of the address.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }
}

/// A configured mail account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable account identifier.
    pub uuid: String,
    /// Display name of the account.
    pub name: String,
    /// Sender identities; the first one is the default.
    pub identities: Vec<Identity>,
    /// Preferred layout for outgoing structured mail.
    #[serde(default)]
    pub variant: SmlVariant,
}

impl Account {
    /// Creates an account with one identity.
    #[must_use]
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, identity: Identity) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            identities: vec![identity],
            variant: SmlVariant::default(),
        }
    }

    /// Sets the preferred SML variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: SmlVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Returns the default identity.
    #[must_use]
    pub fn first_identity(&self) -> Option<&Identity> {
        self.identities.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_plain() {
        assert_eq!(
            Identity::new("", "a@example.org").mailbox(),
            "a@example.org"
        );
        assert_eq!(
            Identity::new("Alice", "a@example.org").mailbox(),
            "Alice <a@example.org>"
        );
    }

    #[test]
    fn test_mailbox_quotes_specials() {
        assert_eq!(
            Identity::new("Doe, Jane", "j@example.org").mailbox(),
            "\"Doe, Jane\" <j@example.org>"
        );
    }

    #[test]
    fn test_mailbox_encodes_non_ascii() {
        let mailbox = Identity::new("Zoë", "z@example.org").mailbox();
        assert!(mailbox.starts_with("=?utf-8?B?"));
        assert!(mailbox.ends_with(" <z@example.org>"));
    }

    #[test]
    fn test_domain() {
        assert_eq!(Identity::new("", "a@example.org").domain(), Some("example.org"));
        assert_eq!(Identity::new("", "local").domain(), None);
    }
}
