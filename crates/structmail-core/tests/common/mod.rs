//! In-memory collaborators shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use structmail_core::{
    Account, AccountStore, Attachment, AttachmentResolver, BarcodeEncoder, BarcodeFormat,
    BarcodeImage, CardRenderer, Clipboard, Collaborators, DeliveryService, Dispatcher, FetchError,
    Host, HtmlExtractor, HttpFetcher, Identity, SmlSettings,
};
use structmail_mime::Message;
use tempfile::TempDir;

/// Side effects observed by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Notify(String),
    Alert(String),
    Cards(Vec<String>),
    Source(String),
    Image(BarcodeFormat, u32, u32),
    Share(PathBuf, String),
    OpenFile(PathBuf, String),
    OpenUrl(String),
    Compose(String, String),
    AccountSetup,
    Script(String),
}

#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn notify(&self, message: &str) {
        self.push(HostEvent::Notify(message.to_string()));
    }

    fn alert(&self, message: &str) {
        self.push(HostEvent::Alert(message.to_string()));
    }

    fn show_cards(&self, cards: &[String]) {
        self.push(HostEvent::Cards(cards.to_vec()));
    }

    fn show_source(&self, source: &str) {
        self.push(HostEvent::Source(source.to_string()));
    }

    fn show_image(&self, image: &BarcodeImage) {
        // The fake encoder stores the format name in the image data.
        let format = if image.data == b"pdf417" {
            BarcodeFormat::Pdf417
        } else {
            BarcodeFormat::Qr
        };
        self.push(HostEvent::Image(format, image.width, image.height));
    }

    fn share_file(&self, path: &Path, mime_type: &str) -> structmail_core::Result<()> {
        self.push(HostEvent::Share(path.to_path_buf(), mime_type.to_string()));
        Ok(())
    }

    fn open_file(&self, path: &Path, mime_type: &str) -> structmail_core::Result<()> {
        self.push(HostEvent::OpenFile(path.to_path_buf(), mime_type.to_string()));
        Ok(())
    }

    fn open_url(&self, url: &str) -> structmail_core::Result<()> {
        self.push(HostEvent::OpenUrl(url.to_string()));
        Ok(())
    }

    fn compose(&self, account: &Account, payload: &str) {
        self.push(HostEvent::Compose(account.uuid.clone(), payload.to_string()));
    }

    fn start_account_setup(&self) {
        self.push(HostEvent::AccountSetup);
    }

    async fn evaluate_script(&self, script: &str) -> Option<String> {
        self.push(HostEvent::Script(script.to_string()));
        Some("[object Window]".to_string())
    }
}

#[derive(Default)]
pub struct RecordingClipboard {
    entries: Mutex<Vec<(String, String)>>,
}

impl RecordingClipboard {
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap().clone()
    }
}

impl Clipboard for RecordingClipboard {
    fn set_text(&self, label: &str, text: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((label.to_string(), text.to_string()));
    }
}

pub struct FixedAccounts(pub Option<Account>);

impl AccountStore for FixedAccounts {
    fn default_account(&self) -> Option<Account> {
        self.0.clone()
    }
}

/// Captures sent messages together with their description.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<(String, Message, String)>>,
}

impl RecordingDelivery {
    pub fn sent(&self) -> Vec<(String, Message, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryService for RecordingDelivery {
    async fn send(
        &self,
        account: &Account,
        message: &Message,
        description: &str,
    ) -> structmail_core::Result<()> {
        self.sent.lock().unwrap().push((
            account.uuid.clone(),
            message.clone(),
            description.to_string(),
        ));
        Ok(())
    }
}

/// Serves canned pages and records every requested URL.
#[derive(Default)]
pub struct PageFetcher {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl PageFetcher {
    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetcher for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or(FetchError::Status(404))
    }
}

pub struct NameBarcode;

impl BarcodeEncoder for NameBarcode {
    fn encode(
        &self,
        _text: &str,
        format: BarcodeFormat,
        width: u32,
        height: u32,
    ) -> structmail_core::Result<BarcodeImage> {
        let data = match format {
            BarcodeFormat::Pdf417 => b"pdf417".to_vec(),
            BarcodeFormat::Qr => b"qr".to_vec(),
        };
        Ok(BarcodeImage {
            mime_type: "image/png".to_string(),
            width,
            height,
            data,
        })
    }
}

pub struct SingleAttachment;

impl AttachmentResolver for SingleAttachment {
    fn resolve(&self, content_id: &str) -> Option<Attachment> {
        (content_id == "logo@example.org").then(|| Attachment {
            mime_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G'],
        })
    }
}

pub fn test_account() -> Account {
    Account::new(
        "acc-1",
        "Work",
        Identity::new("Alice Example", "alice@example.org"),
    )
}

/// A dispatcher wired to recording fakes.
pub struct Fixture {
    pub host: Arc<RecordingHost>,
    pub clipboard: Arc<RecordingClipboard>,
    pub delivery: Arc<RecordingDelivery>,
    pub fetcher: Arc<PageFetcher>,
    pub temp: TempDir,
    pub dispatcher: Dispatcher,
}

impl Fixture {
    pub fn new(account: Option<Account>, fetcher: PageFetcher) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let settings = SmlSettings {
            temp_dir: temp.path().join("share"),
            ..SmlSettings::default()
        };

        let host = Arc::new(RecordingHost::default());
        let clipboard = Arc::new(RecordingClipboard::default());
        let delivery = Arc::new(RecordingDelivery::default());
        let fetcher = Arc::new(fetcher);

        let services = Collaborators {
            host: host.clone(),
            clipboard: clipboard.clone(),
            accounts: Arc::new(FixedAccounts(account)),
            delivery: delivery.clone(),
            fetcher: fetcher.clone(),
            renderer: Arc::new(CardRenderer::new()),
            extractor: Arc::new(HtmlExtractor::new()),
            barcode: Arc::new(NameBarcode),
            attachments: Some(Arc::new(SingleAttachment)),
        };

        Self {
            host,
            clipboard,
            delivery,
            fetcher,
            temp,
            dispatcher: Dispatcher::new(settings, services),
        }
    }

    pub fn with_account() -> Self {
        Self::new(Some(test_account()), PageFetcher::default())
    }

    pub fn without_account() -> Self {
        Self::new(None, PageFetcher::default())
    }
}
