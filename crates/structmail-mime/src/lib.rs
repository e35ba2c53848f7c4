//! # structmail-mime
//!
//! MIME message model used by structured email: content types, ordered
//! headers, transfer encodings and multipart serialization.
//!
//! ## Features
//!
//! - **Message model**: single-part and multipart messages with ordered headers
//! - **Serialization**: CRLF wire form with boundaries and closing delimiter
//! - **Parsing**: one-level multipart splitting for inbound inspection
//! - **Encoding/Decoding**: Base64, URL-safe Base64, Quoted-Printable, RFC 2047
//!
//! ## Quick Start
//!
//! ```ignore
//! use structmail_mime::{ContentType, Headers, Message, Part, TransferEncoding};
//!
//! let mut headers = Headers::new();
//! headers.add("Subject", "Booking");
//! headers.add("Content-Type", ContentType::multipart_alternative("b1").to_string());
//!
//! let plain = Part::text(&ContentType::text_plain(), TransferEncoding::QuotedPrintable, "Hi");
//! let json = Part::text(&ContentType::ld_json(), TransferEncoding::EightBit, "{}");
//!
//! let raw = Message::multipart(headers, vec![plain, json]).to_rfc5322()?;
//! let parsed = Message::parse(&raw)?;
//! assert_eq!(parsed.text_of_type("application/ld+json")?, "{}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::{ContentType, LD_JSON};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
