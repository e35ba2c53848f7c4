//! Error types for the core library.

use thiserror::Error;

use crate::assemble::BuildError;
use crate::dispatch::DecodeError;
use crate::host::FetchError;
use crate::render::RenderError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A structured payload must hold at least one object.
    #[error("Structured payload must not be empty")]
    EmptyPayload,

    /// Text could not be interpreted as a structured payload.
    #[error("Invalid structured payload: {0}")]
    InvalidPayload(String),

    /// Rendering a structured object failed.
    #[error("Template render error: {0}")]
    TemplateRender(#[from] RenderError),

    /// An action URI payload could not be decoded.
    #[error("Could not decode action: {0}")]
    Decode(#[from] DecodeError),

    /// Fetching a remote document failed.
    #[error("Network fetch failed: {0}")]
    NetworkFetch(#[from] FetchError),

    /// A date or date-time value could not be parsed.
    #[error("Date parse error: {0}")]
    DateParse(String),

    /// Message assembly failed.
    #[error("Message build failed: {0}")]
    Build(#[from] BuildError),

    /// No default account is configured.
    #[error("No default account configured")]
    MissingAccount,

    /// MIME encoding or parsing failed.
    #[error("MIME error: {0}")]
    Mime(#[from] structmail_mime::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An OS integration (browser, viewer, share sheet, barcode) failed.
    #[error("Host error: {0}")]
    Host(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
