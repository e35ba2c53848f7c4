//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use structmail_core::{Identity, SmlVariant, Syntax};

#[derive(Parser, Debug)]
#[command(name = "structmail", version, about = "Structured email (SML) toolkit", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "STRUCTMAIL_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Sending identity, e.g. "Alice <alice@example.org>"
    #[arg(long, env = "STRUCTMAIL_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Directory receiving messages "sent" by the CLI
    #[arg(long, env = "STRUCTMAIL_OUTBOX", global = true)]
    pub outbox: Option<PathBuf>,

    /// Override the configured layout
    #[arg(long, global = true)]
    pub variant: Option<VariantArg>,

    /// Write the Date header in UTC
    #[arg(long, global = true)]
    pub hide_timezone: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose a structured message from a JSON(-LD) payload
    Compose(ComposeArgs),
    /// Extract structured data from an HTML document
    Extract {
        /// HTML file ("-" for stdin)
        input: PathBuf,
        /// Markup syntax to read; tries JSON-LD then Microdata by default
        #[arg(long)]
        syntax: Option<SyntaxArg>,
    },
    /// Render a payload as an HTML card page
    Render {
        /// JSON(-LD) file ("-" for stdin)
        payload: PathBuf,
        /// Omit action buttons
        #[arg(long)]
        no_buttons: bool,
    },
    /// Show the structured data of a received message
    Inspect {
        /// RFC 5322 message file ("-" for stdin)
        message: PathBuf,
        /// Add a "Show source" button to each card
        #[arg(long)]
        show_source: bool,
    },
    /// Activate an action URI as if clicked in a rendered card
    Dispatch {
        /// The URI, e.g. xshareascalendar://eyJ...
        uri: String,
        /// Message whose inline attachments `cid:` URIs refer to
        #[arg(long)]
        message: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
pub struct ComposeArgs {
    /// JSON(-LD) file holding one object or an array ("-" for stdin)
    pub payload: PathBuf,
    /// Recipient (repeatable)
    #[arg(long = "to", required = true)]
    pub to: Vec<String>,
    /// Subject line
    #[arg(long, default_value = "")]
    pub subject: String,
    /// Plain-text body
    #[arg(long)]
    pub plain: Option<String>,
    /// Use this HTML file as body instead of rendered cards
    #[arg(long)]
    pub html: Option<PathBuf>,
    /// Output file (defaults to stdout)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
    /// Mark the message as a draft
    #[arg(long)]
    pub draft: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum VariantArg {
    Embedded,
    Dedicated,
}

impl From<VariantArg> for SmlVariant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Embedded => Self::EmbeddedInHtml,
            VariantArg::Dedicated => Self::DedicatedPart,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum SyntaxArg {
    JsonLd,
    Microdata,
}

impl From<SyntaxArg> for Syntax {
    fn from(value: SyntaxArg) -> Self {
        match value {
            SyntaxArg::JsonLd => Self::JsonLd,
            SyntaxArg::Microdata => Self::Microdata,
        }
    }
}

/// Parses `Name <email>` or a bare address.
pub fn parse_identity(text: &str) -> Option<Identity> {
    let text = text.trim();
    if let Some((name, rest)) = text.split_once('<') {
        let email = rest.strip_suffix('>')?.trim();
        let name = name.trim().trim_matches('"');
        return email
            .contains('@')
            .then(|| Identity::new(if name.is_empty() { email } else { name }, email));
    }
    text.contains('@').then(|| Identity::new(text, text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_identities() {
        let identity = parse_identity("\"Alice Example\" <alice@example.org>").unwrap();
        assert_eq!(identity.name, "Alice Example");
        assert_eq!(identity.email, "alice@example.org");

        let bare = parse_identity("bob@example.org").unwrap();
        assert_eq!(bare.email, "bob@example.org");

        assert!(parse_identity("nobody").is_none());
        assert!(parse_identity("Alice <alice@example.org").is_none());
    }

    #[test]
    fn parses_dispatch_command() {
        let cli = Cli::try_parse_from([
            "structmail",
            "--variant",
            "embedded",
            "dispatch",
            "xalert:hi",
        ])
        .unwrap();
        assert_eq!(cli.variant, Some(VariantArg::Embedded));
        assert!(matches!(cli.command, Commands::Dispatch { ref uri, .. } if uri == "xalert:hi"));
    }

    #[test]
    fn compose_requires_recipient() {
        assert!(Cli::try_parse_from(["structmail", "compose", "data.json"]).is_err());
    }
}
