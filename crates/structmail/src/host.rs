//! Desktop implementations of the core collaborator traits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use structmail_core::{
    Account, AccountStore, Attachment, AttachmentResolver, BarcodeEncoder, BarcodeFormat,
    BarcodeImage, Clipboard, DeliveryService, Error, Host, Result,
};
use structmail_mime::Message;
use tracing::info;

/// Reports to the terminal and hands files and URLs to the desktop.
#[derive(Debug, Clone)]
pub struct ConsoleHost {
    output_dir: PathBuf,
}

impl ConsoleHost {
    pub const fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn write_output(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    fn open_path(path: &Path) -> Result<()> {
        opener::open(path).map_err(|e| Error::Host(format!("cannot open {}: {e}", path.display())))
    }
}

#[async_trait]
impl Host for ConsoleHost {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }

    fn alert(&self, message: &str) {
        println!("{message}");
    }

    fn show_cards(&self, cards: &[String]) {
        let page = structmail_core::render::card_page(cards);
        match self.write_output("cards.html", page.as_bytes()) {
            Ok(path) => {
                println!("{} card(s) written to {}", cards.len(), path.display());
                if let Err(e) = Self::open_path(&path) {
                    tracing::warn!("{}", e);
                }
            }
            Err(e) => tracing::error!("Could not write cards: {}", e),
        }
    }

    fn show_source(&self, source: &str) {
        println!("{source}");
    }

    fn show_image(&self, image: &BarcodeImage) {
        let extension = image.mime_type.rsplit('/').next().unwrap_or("bin");
        match self.write_output(&format!("barcode.{extension}"), &image.data) {
            Ok(path) => {
                if let Err(e) = Self::open_path(&path) {
                    tracing::warn!("{}", e);
                }
            }
            Err(e) => tracing::error!("Could not write barcode: {}", e),
        }
    }

    fn share_file(&self, path: &Path, mime_type: &str) -> Result<()> {
        println!("{} ({mime_type})", path.display());
        Ok(())
    }

    fn open_file(&self, path: &Path, _mime_type: &str) -> Result<()> {
        Self::open_path(path)
    }

    fn open_url(&self, url: &str) -> Result<()> {
        opener::open_browser(url).map_err(|e| Error::Host(format!("cannot open {url}: {e}")))
    }

    fn compose(&self, account: &Account, payload: &str) {
        println!("Compose from {} with payload:\n{payload}", account.name);
    }

    fn start_account_setup(&self) {
        eprintln!("No account configured; pass --account \"Name <address>\"");
    }

    async fn evaluate_script(&self, script: &str) -> Option<String> {
        tracing::debug!("No script engine for {:?}", script);
        None
    }
}

/// Clipboard stand-in printing what would be copied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleClipboard;

impl Clipboard for ConsoleClipboard {
    fn set_text(&self, label: &str, text: &str) {
        eprintln!("{label}");
        println!("{text}");
    }
}

/// The single account given on the command line.
#[derive(Debug, Clone)]
pub struct StaticAccountStore(pub Option<Account>);

impl AccountStore for StaticAccountStore {
    fn default_account(&self) -> Option<Account> {
        self.0.clone()
    }
}

/// Delivers messages as `.eml` files in a directory.
#[derive(Debug, Clone)]
pub struct FileOutbox {
    dir: PathBuf,
}

impl FileOutbox {
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl DeliveryService for FileOutbox {
    async fn send(&self, account: &Account, message: &Message, description: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name: String = description
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = self
            .dir
            .join(format!("{}-{name}.eml", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
        tokio::fs::write(&path, message.to_bytes()?).await?;
        info!("Queued {} from {} in {:?}", description, account.name, path);
        Ok(())
    }
}

/// No barcode support on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedBarcodeEncoder;

impl BarcodeEncoder for UnsupportedBarcodeEncoder {
    fn encode(
        &self,
        _text: &str,
        format: BarcodeFormat,
        _width: u32,
        _height: u32,
    ) -> Result<BarcodeImage> {
        Err(Error::Host(format!("{format:?} barcodes are not supported")))
    }
}

/// Inline attachments of a parsed message, keyed by `Content-ID`.
#[derive(Debug, Clone)]
pub struct MessageAttachments(pub Message);

impl AttachmentResolver for MessageAttachments {
    fn resolve(&self, content_id: &str) -> Option<Attachment> {
        let part = self.0.parts.iter().find(|part| {
            part.headers
                .get("content-id")
                .is_some_and(|id| id.trim().trim_start_matches('<').trim_end_matches('>') == content_id)
        })?;
        Some(Attachment {
            mime_type: part
                .content_type()
                .map_or_else(|_| "application/octet-stream".to_string(), |ct| ct.mime_type()),
            data: part.decode_body().ok()?,
        })
    }
}
