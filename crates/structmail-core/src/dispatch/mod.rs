//! Action-URI dispatch.
//!
//! Rendered cards link to private URI schemes (`xshareasfile:`,
//! `xloadcards:`, approve/deny `mailto:` links, ...). When the user
//! activates one, the view hands the URI to [`Dispatcher::dispatch`],
//! which decodes it and routes it to the matching handler. Failures are
//! reported to the user through the [`Host`] and never escape.

mod action;
mod calendar;

pub use action::{
    ActionUri, DecodeError, Scheme, decode_object, decode_payload, decode_recipient, decode_text,
    decode_text_list,
};
pub use calendar::{CalendarEvent, EventTime};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use structmail_mime::LD_JSON;

use crate::assemble::{BuildError, BuildOutcome, MessageAssembler};
use crate::compose::SmlComposer;
use crate::config::SmlSettings;
use crate::error::{Error, Result};
use crate::extract::{StructuredDataExtractor, extract_json_str};
use crate::host::{
    AccountStore, Attachment, AttachmentResolver, BarcodeEncoder, BarcodeFormat, Clipboard,
    DeliveryService, Host, HttpFetcher,
};
use crate::payload::{StructuredObject, StructuredPayload, object_type};
use crate::render::{TemplateRenderer, render_each, share_as_mail_button};

/// Boarding pass shown by `xbarcode:` links.
pub const BOARDING_PASS_DEMO: &str = "M1TEST/HIDDEN E8OQ6FU FRARLGLH 4010 012C004D0001 35C>2180WM6012BLH 2922023642241060 LH *30600000K09";

/// Script evaluated by `xjs:` links.
pub const XJS_SCRIPT: &str = "(function() { return 'this'; })();";

const DEFAULT_SHARE_FILE_NAME: &str = "sml.json";
const CALENDAR_MIME_TYPE: &str = "text/calendar";
const BARCODE_WIDTH: u32 = 600;
const BARCODE_HEIGHT: u32 = 400;

/// Services the dispatcher acts through.
#[derive(Clone)]
pub struct Collaborators {
    /// User-facing side effects.
    pub host: Arc<dyn Host>,
    /// System clipboard.
    pub clipboard: Arc<dyn Clipboard>,
    /// Configured accounts.
    pub accounts: Arc<dyn AccountStore>,
    /// Outgoing mail.
    pub delivery: Arc<dyn DeliveryService>,
    /// Remote documents.
    pub fetcher: Arc<dyn HttpFetcher>,
    /// Card rendering.
    pub renderer: Arc<dyn TemplateRenderer>,
    /// Structured data in fetched pages.
    pub extractor: Arc<dyn StructuredDataExtractor>,
    /// Barcode images.
    pub barcode: Arc<dyn BarcodeEncoder>,
    /// Inline attachments of the displayed message.
    pub attachments: Option<Arc<dyn AttachmentResolver>>,
}

/// Routes action URIs to their handlers.
pub struct Dispatcher {
    settings: SmlSettings,
    services: Collaborators,
    composer: SmlComposer,
    assembler: MessageAssembler,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(settings: SmlSettings, services: Collaborators) -> Self {
        let composer = SmlComposer::new(
            Arc::clone(&services.renderer),
            settings.composer_settings(),
        );
        Self {
            settings,
            services,
            composer,
            assembler: MessageAssembler::new(),
        }
    }

    /// Replaces the assembler used for approve/deny replies.
    #[must_use]
    pub fn with_assembler(mut self, assembler: MessageAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn settings(&self) -> &SmlSettings {
        &self.settings
    }

    /// Handles an activated URI.
    ///
    /// Returns `false` only for `cid:` references, which the view loads
    /// itself (see [`Dispatcher::resolve_cid`]). Every other URI is
    /// consumed; errors are logged and shown to the user.
    pub async fn dispatch(&mut self, uri: &str) -> bool {
        let action = ActionUri::parse(uri);
        let scheme = action.scheme();
        tracing::debug!("Dispatching {:?} action", scheme);

        let result = match scheme {
            Scheme::Cid => return false,
            Scheme::Mailto => self.mailto(&action).await,
            Scheme::XShareAsFile => self.share_as_file(&action).await,
            Scheme::XShareAsCalendar => self.share_as_calendar(&action).await,
            Scheme::XShareAsMail => self.share_as_mail(&action),
            Scheme::XLoadCards => self.load_cards(&action).await,
            Scheme::XRequest => self.request(&action).await,
            Scheme::XReload => self.reload(&action).await,
            Scheme::XBarcode => self.barcode(),
            Scheme::XShowSource => self.show_source(&action),
            Scheme::XJs => {
                let result = self.services.host.evaluate_script(XJS_SCRIPT).await;
                self.services.host.alert(result.as_deref().unwrap_or("null"));
                Ok(())
            }
            Scheme::XAlert => {
                self.services.host.alert(action.as_str());
                Ok(())
            }
            Scheme::XClipboard => {
                let text = action.scheme_specific_part();
                self.services
                    .clipboard
                    .set_text(&format!("Copied {text}"), &text);
                Ok(())
            }
            Scheme::File => {
                self.services
                    .clipboard
                    .set_text(&format!("Copied {}", action.as_str()), action.as_str());
                Ok(())
            }
            Scheme::Other => self.services.host.open_url(action.as_str()),
        };

        if let Err(e) = result {
            self.report(scheme, e);
        }
        true
    }

    /// Resolves a `cid:` URI against the displayed message's attachments.
    #[must_use]
    pub fn resolve_cid(&self, uri: &str) -> Option<Attachment> {
        let action = ActionUri::parse(uri);
        if action.scheme() != Scheme::Cid {
            return None;
        }
        let content_id = action.scheme_specific_part();
        let content_id = content_id.trim_start_matches('<').trim_end_matches('>');
        self.services.attachments.as_ref()?.resolve(content_id)
    }

    fn report(&self, scheme: Scheme, error: Error) {
        match error {
            Error::Decode(e) => {
                tracing::warn!("Could not decode {:?} action: {}", scheme, e);
                self.services.host.notify("Could not decode action");
            }
            Error::MissingAccount => {
                tracing::debug!("No default account, starting account setup");
                self.services.host.start_account_setup();
            }
            e => {
                tracing::warn!("{:?} action failed: {}", scheme, e);
                self.services.host.notify(&e.to_string());
            }
        }
    }

    async fn mailto(&mut self, action: &ActionUri) -> Result<()> {
        let Some(token) = action.query_param("action") else {
            return self.services.host.open_url(action.as_str());
        };
        let Some(reply) = approve_deny_payload(&token) else {
            tracing::debug!("Ignoring unknown mail action {:?}", token);
            return Ok(());
        };
        let recipient = decode_recipient(action.path())?;

        let account = self
            .services
            .accounts
            .default_account()
            .ok_or(Error::MissingAccount)?;
        let identity = account
            .first_identity()
            .cloned()
            .ok_or(BuildError::MissingIdentity)?;

        let builder = self
            .composer
            .compose(
                &StructuredPayload::single(reply),
                account.variant,
                None,
                None,
                None,
            )?
            .to(vec![recipient])
            .subject(token.as_str())
            .identity(identity);

        match self.assembler.build_async(builder).outcome().await {
            BuildOutcome::Success { message, .. } => {
                self.services
                    .delivery
                    .send(&account, &message, &token)
                    .await?;
                tracing::info!("Sent {} reply for account {}", token, account.name);
                self.services.host.notify(&format!("Sent {token}"));
                Ok(())
            }
            BuildOutcome::Cancelled => {
                tracing::debug!("{} reply cancelled", token);
                Ok(())
            }
            BuildOutcome::Failed(e) => Err(e.into()),
            BuildOutcome::PendingAuthorization { request_code, .. } => {
                tracing::warn!(
                    "{} reply awaits authorization (request {}), not sent",
                    token,
                    request_code
                );
                Ok(())
            }
        }
    }

    async fn share_as_file(&self, action: &ActionUri) -> Result<()> {
        let json = decode_text(action.payload())?;
        let file_name = action
            .query_param("fileName")
            .and_then(|name| safe_file_name(&name))
            .unwrap_or_else(|| DEFAULT_SHARE_FILE_NAME.to_string());

        let path = self.write_temp_file(&file_name, json.as_bytes()).await?;
        self.services.host.share_file(&path, LD_JSON)
    }

    async fn share_as_calendar(&self, action: &ActionUri) -> Result<()> {
        let object = decode_object(action.payload())?;
        let ics = CalendarEvent::from_object(&object).to_ics(Utc::now());

        let digest = hex::encode(Sha256::digest(Value::Object(object).to_string().as_bytes()));
        let path = self
            .write_temp_file(&format!("{digest}.ics"), ics.as_bytes())
            .await?;
        self.services.host.open_file(&path, CALENDAR_MIME_TYPE)
    }

    fn share_as_mail(&self, action: &ActionUri) -> Result<()> {
        let payload = decode_text(action.payload())?;
        let account = self
            .services
            .accounts
            .default_account()
            .ok_or(Error::MissingAccount)?;
        self.services.host.compose(&account, &payload);
        Ok(())
    }

    async fn load_cards(&self, action: &ActionUri) -> Result<()> {
        let urls = decode_text_list(action.payload())?;
        let max_cards = self.settings.max_cards;
        let mut cards = Vec::new();

        for url in &urls {
            if cards.len() >= max_cards {
                break;
            }
            let body = match self.services.fetcher.fetch(url).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("Could not load cards from {}: {}", url, e);
                    self.services.host.notify(&format!("Got no content ({e})"));
                    continue;
                }
            };

            for item in self.services.extractor.extract_with_fallback(&body) {
                if cards.len() >= max_cards {
                    break;
                }
                if object_type(&item.object).is_some_and(|kind| self.settings.skips_type(kind)) {
                    tracing::debug!("Skipping {:?} card from {}", object_type(&item.object), url);
                    continue;
                }
                let buttons = [share_as_mail_button(&item.object)];
                match self.services.renderer.render(&item.object, &buttons) {
                    Ok(card) => cards.push(card),
                    Err(e) => tracing::warn!("Dropping card from {}: {}", url, e),
                }
            }
        }

        tracing::debug!("Loaded {} card(s) from {} URL(s)", cards.len(), urls.len());
        if !cards.is_empty() {
            self.services.host.show_cards(&cards);
        }
        Ok(())
    }

    async fn request(&self, action: &ActionUri) -> Result<()> {
        let url = action.with_scheme("https");
        self.services.fetcher.fetch(&url).await?;
        tracing::debug!("Requested {}", url);
        Ok(())
    }

    async fn reload(&self, action: &ActionUri) -> Result<()> {
        let url = action.with_scheme("https");
        let body = match self.services.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Reload of {} failed: {}", url, e);
                self.services.host.notify(&format!("Got no content ({e})"));
                return Ok(());
            }
        };

        let items = extract_json_str(&body);
        let report = render_each(
            self.services.renderer.as_ref(),
            items.iter().map(|item| &item.object),
            |_| Vec::new(),
        );
        if report.fragments.is_empty() {
            tracing::debug!("Nothing to show from {}", url);
        } else {
            self.services.host.show_cards(&report.fragments);
        }
        Ok(())
    }

    fn barcode(&self) -> Result<()> {
        let image = self.services.barcode.encode(
            BOARDING_PASS_DEMO,
            BarcodeFormat::Pdf417,
            BARCODE_WIDTH,
            BARCODE_HEIGHT,
        )?;
        self.services.host.show_image(&image);
        Ok(())
    }

    fn show_source(&self, action: &ActionUri) -> Result<()> {
        let sources = decode_text_list(action.payload())?;
        if let Some(first) = sources.first() {
            self.services.host.show_source(first);
        }
        Ok(())
    }

    async fn write_temp_file(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        let dir = &self.settings.temp_dir;
        let path = dir.join(file_name);
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, contents).await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::debug!("Wrote {:?}", path);
                Ok(path)
            }
            Err(e) => {
                tracing::error!("Could not write {:?}: {}", path, e);
                Err(e.into())
            }
        }
    }
}

/// Reply object for an approve/deny action token.
///
/// `ConfirmAction` answers "Approved", `CancelAction` answers "Denied";
/// other tokens have no reply.
#[must_use]
pub fn approve_deny_payload(token: &str) -> Option<StructuredObject> {
    let name = match token {
        "ConfirmAction" => "Approved",
        "CancelAction" => "Denied",
        _ => return None,
    };
    match json!({
        "@context": "http://schema.org",
        "@type": token,
        "name": name,
    }) {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

fn safe_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_deny_payloads() {
        let approve = approve_deny_payload("ConfirmAction").unwrap();
        assert_eq!(approve["@type"], "ConfirmAction");
        assert_eq!(approve["name"], "Approved");
        assert_eq!(approve["@context"], "http://schema.org");

        assert_eq!(approve_deny_payload("CancelAction").unwrap()["name"], "Denied");
        assert!(approve_deny_payload("DeleteAction").is_none());
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("trip.json").as_deref(), Some("trip.json"));
        assert_eq!(safe_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(safe_file_name(""), None);
        assert_eq!(safe_file_name(".."), None);
    }
}
