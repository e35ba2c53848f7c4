//! Failures raised while encoding, decoding or splitting messages.

use std::string::FromUtf8Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` value could not be read.
    #[error("malformed content type {0:?}")]
    ContentType(String),

    /// A quoted-printable escape is not followed by two hex digits.
    #[error("bad quoted-printable escape at offset {0}")]
    QuotedPrintable(usize),

    /// An RFC 2047 encoded word is malformed.
    #[error("bad encoded word {0:?}")]
    EncodedWord(String),

    /// Base64 or base64url payload is corrupt.
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8 text.
    #[error("decoded text is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// A multipart content type carries no `boundary` parameter.
    #[error("multipart content type without boundary")]
    NoBoundary,

    /// The body does not follow the multipart layout it announces.
    #[error("broken multipart body: {0}")]
    Multipart(String),

    /// The header block is not followed by an empty line.
    #[error("message has no body")]
    NoBody,

    /// No part of the requested media type exists.
    #[error("no {0} part in message")]
    MissingPart(String),
}
