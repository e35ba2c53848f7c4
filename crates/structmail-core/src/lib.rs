//! # structmail-core
//!
//! Structured email (SML) support for mail clients.
//!
//! This crate provides:
//! - **Payload encoding** - structured objects into plain, HTML and `application/ld+json` bodies
//! - **Card rendering** - HTML cards with derived action buttons
//! - **Extraction** - JSON-LD and Microdata from HTML documents
//! - **Message assembly** - asynchronous, cancellable MIME builds
//! - **Action dispatch** - the private URI schemes activated from rendered cards
//! - **Calendar export** - iCalendar files from event objects
//!
//! Everything with a side effect outside the crate (accounts, delivery,
//! HTTP, clipboard, OS integration) goes through the traits in [`host`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod assemble;
pub mod compose;
pub mod config;
pub mod dispatch;
mod error;
pub mod extract;
pub mod fetch;
pub mod host;
pub mod inspect;
pub mod payload;
pub mod render;

pub use account::{Account, Identity};
pub use assemble::{
    Authorization, AuthorizationResult, AuthorizationToken, BuildAuthorizer, BuildError,
    BuildHandle, BuildOutcome, ComposedMessageBuilder, MessageAssembler, MessageFormat,
};
pub use compose::{ComposerSettings, SmlComposer};
pub use config::SmlSettings;
pub use dispatch::{ActionUri, CalendarEvent, Collaborators, DecodeError, Dispatcher, Scheme};
pub use error::{Error, Result};
pub use extract::{ExtractedItem, HtmlExtractor, StructuredDataExtractor, Syntax};
pub use fetch::ReqwestFetcher;
pub use host::{
    AccountStore, Attachment, AttachmentResolver, BarcodeEncoder, BarcodeFormat, BarcodeImage,
    Clipboard, DeliveryService, FetchError, Host, HttpFetcher,
};
pub use inspect::{Inspection, MessageInspector};
pub use payload::{SmlVariant, StructuredObject, StructuredPayload};
pub use render::{ActionButton, CardRenderer, RenderError, RenderReport, TemplateRenderer};
