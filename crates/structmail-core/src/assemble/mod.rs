//! Asynchronous MIME message assembly.
//!
//! A [`ComposedMessageBuilder`] is finalized by a [`MessageAssembler`]
//! on a background task. The resulting [`BuildHandle`] resolves to one of
//! four [`BuildOutcome`]s and can be cancelled before it completes.

mod assembler;
mod builder;

pub use assembler::{
    Authorization, AuthorizationResult, AuthorizationToken, BuildAuthorizer, BuildHandle,
    BuildOutcome, MessageAssembler, assemble_message, format_date,
};
pub use builder::{ComposedMessageBuilder, MessageFormat};

use thiserror::Error;

/// Errors that make a build fail.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No sender identity was set.
    #[error("No sender identity set")]
    MissingIdentity,

    /// MIME serialization failed.
    #[error("MIME error: {0}")]
    Mime(#[from] structmail_mime::Error),

    /// The authorizer rejected the build outright.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// The token does not belong to a build awaiting authorization.
    #[error("Unknown authorization token: {0}")]
    UnknownToken(AuthorizationToken),

    /// A header value would break the header block.
    #[error("Line break in {0} header")]
    HeaderValue(String),

    /// The build task panicked.
    #[error("Build task failed: {0}")]
    Task(String),
}
