//! Transfer and header codecs.
//!
//! Base64 (standard for bodies, URL-safe for action links),
//! quoted-printable, RFC 2047 encoded words and CRLF normalization.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use crate::error::{Error, Result};

/// Longest encoded line allowed in a body, excluding the CRLF.
const LINE_LIMIT: usize = 76;

/// Encodes bytes as standard Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes standard Base64, ignoring embedded line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.split_ascii_whitespace().collect();
    Ok(STANDARD.decode(compact)?)
}

/// Base64 body text broken into CRLF-separated lines of at most 76 columns.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut lines = Vec::with_capacity(encoded.len() / LINE_LIMIT + 1);
    let mut rest = encoded.as_str();
    while rest.len() > LINE_LIMIT {
        let (line, tail) = rest.split_at(LINE_LIMIT);
        lines.push(line);
        rest = tail;
    }
    lines.push(rest);
    lines.join("\r\n")
}

/// Encodes bytes as URL-safe Base64 without padding or line wrapping.
///
/// Action links embedded in rendered cards carry their payloads this way.
#[must_use]
pub fn encode_base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decodes URL-safe Base64, tolerating trailing `=` padding.
///
/// # Errors
///
/// Returns an error if the input is not valid URL-safe Base64.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(data.trim().trim_end_matches('='))?)
}

/// Rewrites every line ending as CRLF, leaving existing CRLF pairs alone.
#[must_use]
pub fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 32);
    let mut previous = '\0';
    for ch in text.chars() {
        if ch == '\n' && previous != '\r' {
            out.push('\r');
        }
        out.push(ch);
        previous = ch;
    }
    out
}

/// Quoted-printable body encoding (RFC 2045 §6.7).
///
/// Line breaks become hard CRLF breaks. Whitespace at the end of a line is
/// escaped and long lines get soft breaks.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let normalized = to_crlf(text);
    let mut out = String::with_capacity(normalized.len());
    for (index, line) in normalized.split("\r\n").enumerate() {
        if index > 0 {
            out.push_str("\r\n");
        }
        push_qp_line(&mut out, line.as_bytes());
    }
    out
}

fn push_qp_line(out: &mut String, line: &[u8]) {
    let mut column = 0;
    let last = line.len().saturating_sub(1);
    for (position, &byte) in line.iter().enumerate() {
        let literal = match byte {
            b' ' | b'\t' => position != last,
            b'=' => false,
            _ => byte.is_ascii_graphic(),
        };
        let width = if literal { 1 } else { 3 };
        // leave a column for the soft break marker
        if column + width >= LINE_LIMIT {
            out.push_str("=\r\n");
            column = 0;
        }
        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        column += width;
    }
}

/// Decodes quoted-printable text into UTF-8.
///
/// # Errors
///
/// Returns an error on a malformed escape or when the bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let input = text.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut index = 0;
    while index < input.len() {
        let byte = input[index];
        if byte != b'=' {
            out.push(byte);
            index += 1;
            continue;
        }
        match input.get(index + 1..) {
            Some([b'\r', b'\n', ..]) => index += 3,
            Some([b'\n', ..]) => index += 2,
            Some([high, low, ..]) => {
                let (Some(high), Some(low)) = (hex_value(*high), hex_value(*low)) else {
                    return Err(Error::QuotedPrintable(index));
                };
                out.push((high << 4) | low);
                index += 3;
            }
            _ => return Err(Error::QuotedPrintable(index)),
        }
    }
    Ok(String::from_utf8(out)?)
}

const fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Wraps a header value in an RFC 2047 `B` encoded word when it is not
/// plain printable ASCII.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    let printable = text.bytes().all(|b| b == b' ' || b.is_ascii_graphic());
    if printable && !text.contains("=?") {
        return text.to_string();
    }
    format!("=?{charset}?B?{}?=", encode_base64(text.as_bytes()))
}

/// Decodes a header value made of a single RFC 2047 encoded word.
///
/// Values that are not encoded words come back unchanged.
///
/// # Errors
///
/// Returns an error if the encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let Some(word) = text.strip_prefix("=?").and_then(|t| t.strip_suffix("?=")) else {
        return Ok(text.to_string());
    };
    let mut fields = word.splitn(3, '?');
    let (Some(_charset), Some(scheme), Some(payload)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::EncodedWord(text.to_string()));
    };

    if scheme.eq_ignore_ascii_case("b") {
        Ok(String::from_utf8(decode_base64(payload)?)?)
    } else if scheme.eq_ignore_ascii_case("q") {
        decode_quoted_printable(&payload.replace('_', " "))
    } else {
        Err(Error::EncodedWord(text.to_string()))
    }
}

/// Decodes every encoded word in an unstructured header value.
///
/// Whitespace between adjacent encoded words is dropped and malformed
/// words are kept as written.
#[must_use]
pub fn decode_header_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_encoded = false;
    for (index, token) in text.split_ascii_whitespace().enumerate() {
        let encoded = token.starts_with("=?") && token.ends_with("?=");
        let decoded = if encoded {
            decode_rfc2047(token).ok()
        } else {
            None
        };
        if index > 0 && !(previous_encoded && decoded.is_some()) {
            out.push(' ');
        }
        previous_encoded = decoded.is_some();
        out.push_str(decoded.as_deref().unwrap_or(token));
    }
    out
}
