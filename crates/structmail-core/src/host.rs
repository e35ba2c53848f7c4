//! Collaborator interfaces supplied by the embedding application.

use std::path::Path;

use async_trait::async_trait;
use structmail_mime::Message;
use thiserror::Error;

use crate::account::Account;
use crate::error::Result;

/// Errors returned by an [`HttpFetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The request could not be completed.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),
}

/// Inline attachment resolved from a `cid:` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Media type of the content.
    pub mime_type: String,
    /// Raw content.
    pub data: Vec<u8>,
}

/// Resolves `cid:` references of the message being displayed.
pub trait AttachmentResolver: Send + Sync {
    /// Returns the attachment with the given content id.
    fn resolve(&self, content_id: &str) -> Option<Attachment>;
}

/// Read access to configured accounts.
pub trait AccountStore: Send + Sync {
    /// Returns the default account, if one is configured.
    fn default_account(&self) -> Option<Account>;
}

/// Sends assembled messages.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Sends `message` from `account`; `description` labels the send.
    async fn send(&self, account: &Account, message: &Message, description: &str) -> Result<()>;
}

/// Fetches remote documents.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetches `url` and returns the response body as text.
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// System clipboard.
pub trait Clipboard: Send + Sync {
    /// Places `text` on the clipboard; `label` describes it to the user.
    fn set_text(&self, label: &str, text: &str);
}

/// Two-dimensional barcode symbologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeFormat {
    /// PDF417, used on boarding passes.
    Pdf417,
    /// QR code.
    Qr,
}

/// Encoded barcode image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeImage {
    /// Media type of `data` (e.g. `image/png`).
    pub mime_type: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoded image.
    pub data: Vec<u8>,
}

/// Renders text as a barcode image.
pub trait BarcodeEncoder: Send + Sync {
    /// Encodes `text` in `format` at the requested size.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be encoded.
    fn encode(
        &self,
        text: &str,
        format: BarcodeFormat,
        width: u32,
        height: u32,
    ) -> Result<BarcodeImage>;
}

/// User-facing side effects of the application.
#[async_trait]
pub trait Host: Send + Sync {
    /// Shows a short, transient notice.
    fn notify(&self, message: &str);

    /// Shows a modal message.
    fn alert(&self, message: &str);

    /// Shows rendered card fragments.
    fn show_cards(&self, cards: &[String]);

    /// Shows structured source text with an option to copy it.
    fn show_source(&self, source: &str);

    /// Shows an image.
    fn show_image(&self, image: &BarcodeImage);

    /// Offers a file to other applications.
    ///
    /// # Errors
    ///
    /// Returns an error if no share target is available.
    fn share_file(&self, path: &Path, mime_type: &str) -> Result<()>;

    /// Opens a file in its default viewer.
    ///
    /// # Errors
    ///
    /// Returns an error if no viewer is available.
    fn open_file(&self, path: &Path, mime_type: &str) -> Result<()>;

    /// Opens a URL externally.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler accepts the URL.
    fn open_url(&self, url: &str) -> Result<()>;

    /// Opens the composer for `account` prefilled with a structured payload.
    fn compose(&self, account: &Account, payload: &str);

    /// Starts the account setup flow.
    fn start_account_setup(&self);

    /// Evaluates a script in the message view and returns its result.
    async fn evaluate_script(&self, script: &str) -> Option<String>;
}
