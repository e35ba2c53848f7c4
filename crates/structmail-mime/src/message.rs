//! Messages and body parts, in memory and on the wire.

use std::fmt;

use crate::content_type::ContentType;
use crate::encoding::{
    decode_base64, decode_header_text, decode_quoted_printable, encode_base64_wrapped,
    encode_quoted_printable,
};
use crate::error::{Error, Result};
use crate::header::Headers;

/// `Content-Transfer-Encoding` of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// ASCII lines, sent as is.
    #[default]
    SevenBit,
    /// Arbitrary octets in CRLF lines, sent as is.
    EightBit,
    /// Base64 wrapped at 76 columns.
    Base64,
    /// Quoted-printable.
    QuotedPrintable,
    /// Unrestricted octets.
    Binary,
}

impl TransferEncoding {
    /// Reads a header value; anything unknown counts as `7bit`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        [Self::EightBit, Self::Base64, Self::QuotedPrintable, Self::Binary]
            .into_iter()
            .find(|encoding| value.eq_ignore_ascii_case(encoding.token()))
            .unwrap_or_default()
    }

    const fn token(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        }
    }

    /// Applies the encoding to raw content.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => encode_base64_wrapped(data).into_bytes(),
            Self::QuotedPrintable => {
                encode_quoted_printable(&String::from_utf8_lossy(data)).into_bytes()
            }
            Self::SevenBit | Self::EightBit | Self::Binary => data.to_vec(),
        }
    }

    /// Reverses the encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not valid for this encoding.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(&String::from_utf8_lossy(data)),
            Self::QuotedPrintable => {
                decode_quoted_printable(&String::from_utf8_lossy(data)).map(String::into_bytes)
            }
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn content_type_of(headers: &Headers) -> Result<ContentType> {
    headers
        .get("content-type")
        .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
}

fn transfer_encoding_of(headers: &Headers) -> TransferEncoding {
    headers
        .get("content-transfer-encoding")
        .map(TransferEncoding::parse)
        .unwrap_or_default()
}

/// One body part of a multipart message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Body exactly as transported.
    pub body: Vec<u8>,
}

impl Part {
    /// A part from headers and an already encoded body.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// A text part carrying `text` in the given transfer encoding.
    #[must_use]
    pub fn text(content_type: &ContentType, encoding: TransferEncoding, text: &str) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", encoding.to_string());
        Self::new(headers, encoding.encode(text.as_bytes()))
    }

    /// Declared content type, `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read.
    pub fn content_type(&self) -> Result<ContentType> {
        content_type_of(&self.headers)
    }

    /// Declared transfer encoding, `7bit` when absent.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        transfer_encoding_of(&self.headers)
    }

    /// Body with the transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match its encoding.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        self.transfer_encoding().decode(&self.body)
    }

    /// Decoded body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the text is not UTF-8.
    pub fn body_text(&self) -> Result<String> {
        Ok(String::from_utf8(self.decode_body()?)?)
    }

    /// Attachment file name: the `Content-Disposition` `filename`, else the
    /// `Content-Type` `name` parameter.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        let from_header = |header: &str, param: &str| {
            self.headers
                .get(header)
                .and_then(|value| header_parameter(value, param))
        };
        from_header("Content-Disposition", "filename")
            .or_else(|| from_header("Content-Type", "name"))
            .map(decode_header_text)
    }
}

/// Parameter of a `value; name=param` header, quotes removed.
fn header_parameter<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value.split(';').skip(1).find_map(|segment| {
        let (key, param) = segment.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| param.trim().trim_matches('"'))
            .filter(|param| !param.is_empty())
    })
}

/// A message: top-level headers plus either a single body or parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    /// Parts of a multipart message, empty otherwise.
    pub parts: Vec<Part>,
    body: Vec<u8>,
}

impl Message {
    /// A message whose body is `body`, already transfer-encoded.
    #[must_use]
    pub const fn single_part(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            parts: Vec::new(),
            body,
        }
    }

    /// A multipart message; `headers` must declare a boundary.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Part>) -> Self {
        Self {
            headers,
            parts,
            body: Vec::new(),
        }
    }

    /// Declared content type, `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read.
    pub fn content_type(&self) -> Result<ContentType> {
        content_type_of(&self.headers)
    }

    /// Whether the message declares a `multipart/*` type.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type cannot be read.
    pub fn is_multipart(&self) -> Result<bool> {
        Ok(self.content_type()?.is_multipart())
    }

    /// `From` header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// `To` header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// `Subject` header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// `Subject` header with RFC 2047 encoded words decoded.
    #[must_use]
    pub fn decoded_subject(&self) -> Option<String> {
        self.subject().map(decode_header_text)
    }

    /// `Date` header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// `Message-ID` header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Decoded text of a single-part message.
    ///
    /// # Errors
    ///
    /// Returns an error for multipart messages or when decoding fails.
    pub fn body_text(&self) -> Result<String> {
        if !self.parts.is_empty() {
            return Err(Error::Multipart("message has parts, not a body".to_string()));
        }
        let decoded = transfer_encoding_of(&self.headers).decode(&self.body)?;
        Ok(String::from_utf8(decoded)?)
    }

    /// Parts whose media type is `mime_type`; unreadable types never match.
    pub fn parts_of_type<'a>(&'a self, mime_type: &'a str) -> impl Iterator<Item = &'a Part> {
        self.parts
            .iter()
            .filter(move |part| part.content_type().is_ok_and(|ct| ct.is(mime_type)))
    }

    /// Decoded text of the first part of type `mime_type`, or of the whole
    /// body when a single-part message has that type.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such part or decoding fails.
    pub fn text_of_type(&self, mime_type: &str) -> Result<String> {
        if self.parts.is_empty() {
            if self.content_type()?.is(mime_type) {
                return self.body_text();
            }
        } else if let Some(part) = self.parts_of_type(mime_type).next() {
            return part.body_text();
        }
        Err(Error::MissingPart(mime_type.to_string()))
    }

    /// First `text/plain` text.
    ///
    /// # Errors
    ///
    /// Returns an error if there is none or decoding fails.
    pub fn text_part(&self) -> Result<String> {
        self.text_of_type("text/plain")
    }

    /// First `text/html` text.
    ///
    /// # Errors
    ///
    /// Returns an error if there is none or decoding fails.
    pub fn html_part(&self) -> Result<String> {
        self.text_of_type("text/html")
    }

    /// Wire form: headers, blank line, then the body or the delimited parts
    /// followed by the close delimiter.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart message declares no boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = format!("{}\r\n", self.headers).into_bytes();
        if self.parts.is_empty() {
            out.extend_from_slice(&self.body);
            return Ok(out);
        }

        let content_type = self.content_type()?;
        let boundary = content_type.boundary().ok_or(Error::NoBoundary)?;
        for part in &self.parts {
            out.extend_from_slice(format!("--{boundary}\r\n{}\r\n", part.headers).as_bytes());
            out.extend_from_slice(&part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        Ok(out)
    }

    /// [`Self::to_bytes`] as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or a body is not UTF-8.
    pub fn to_rfc5322(&self) -> Result<String> {
        Ok(String::from_utf8(self.to_bytes()?)?)
    }

    /// Reads a raw message. Multipart bodies are split one level deep;
    /// nested multiparts stay raw inside their part.
    ///
    /// # Errors
    ///
    /// Returns an error on an unreadable content type, a multipart type
    /// without boundary or a body lacking its close delimiter.
    pub fn parse(raw: &str) -> Result<Self> {
        let (head, body) = split_head_body(raw);
        let headers = Headers::parse(head);
        let Some(content_type) = headers.get("content-type").map(ContentType::parse).transpose()?
        else {
            return Ok(Self::single_part(headers, body.as_bytes().to_vec()));
        };
        if !content_type.is_multipart() {
            return Ok(Self::single_part(headers, body.as_bytes().to_vec()));
        }
        let boundary = content_type.boundary().ok_or(Error::NoBoundary)?;
        let parts = split_parts(body, boundary)?;
        Ok(Self::multipart(headers, parts))
    }
}

/// Splits at the first empty line, accepting CRLF or bare LF endings.
fn split_head_body(raw: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        if line == "\n" || line == "\r\n" {
            return (&raw[..offset], &raw[offset + line.len()..]);
        }
        offset += line.len();
    }
    (raw, "")
}

/// Cuts a multipart body at its delimiter lines.
///
/// Only lines starting with `--boundary` delimit; the line break before a
/// delimiter belongs to it, not to the preceding part.
fn split_parts(body: &str, boundary: &str) -> Result<Vec<Part>> {
    let open = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\r', '\n']);
        if let Some(rest) = bare.strip_prefix(&open) {
            if let Some(start) = current {
                let section = body[start..offset]
                    .strip_suffix('\n')
                    .map(|s| s.strip_suffix('\r').unwrap_or(s))
                    .unwrap_or(&body[start..offset]);
                let (head, content) = split_head_body(section);
                parts.push(Part::new(Headers::parse(head), content.as_bytes().to_vec()));
            }
            if rest.starts_with("--") {
                return Ok(parts);
            }
            current = Some(offset + line.len());
        }
        offset += line.len();
    }

    Err(Error::Multipart(format!("no close delimiter for {boundary:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn booking() -> Message {
        let mut headers = Headers::new();
        headers.add("Subject", "Booking");
        headers.add("MIME-Version", "1.0");
        headers.add(
            "Content-Type",
            ContentType::multipart_alternative("----=_Part_3_0").to_string(),
        );
        Message::multipart(
            headers,
            vec![
                Part::text(
                    &ContentType::text_plain(),
                    TransferEncoding::QuotedPrintable,
                    "Table for two\r\n",
                ),
                Part::text(
                    &ContentType::ld_json(),
                    TransferEncoding::EightBit,
                    "{\r\n  \"@type\": \"FoodEstablishmentReservation\"\r\n}",
                ),
            ],
        )
    }

    #[test]
    fn test_decoded_subject() {
        let mut message = booking();
        assert_eq!(message.decoded_subject().as_deref(), Some("Booking"));
        message
            .headers
            .set("Subject", "=?utf-8?B?RGVpbiBDb2Rl?= =?utf-8?q?_f=C3=BCr_heute?=");
        assert_eq!(message.decoded_subject().as_deref(), Some("Dein Code für heute"));
    }

    #[test]
    fn test_attachment_file_name() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/calendar; method=REQUEST; name=\"invite.ics\"");
        let part = Part::new(headers.clone(), Vec::new());
        assert_eq!(part.file_name().as_deref(), Some("invite.ics"));

        headers.add("Content-Disposition", "attachment; FileName=\"Trip plan.ics\"");
        let part = Part::new(headers, Vec::new());
        assert_eq!(part.file_name().as_deref(), Some("Trip plan.ics"));

        assert!(booking().parts[0].file_name().is_none());
    }

    #[test]
    fn test_transfer_encoding_tokens() {
        assert_eq!(TransferEncoding::parse(" 8BIT "), TransferEncoding::EightBit);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
    }

    #[test]
    fn test_base64_part_decodes() {
        let part = Part::text(&ContentType::text_html(), TransferEncoding::Base64, "<p>Zoë</p>");
        assert_eq!(part.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(part.body_text().unwrap(), "<p>Zoë</p>");
    }

    #[test]
    fn test_wire_layout() {
        let raw = booking().to_rfc5322().unwrap();
        assert!(raw.starts_with("Subject: Booking\r\nMIME-Version: 1.0\r\n"));
        assert!(raw.contains("\r\n\r\n------=_Part_3_0\r\nContent-Type: text/plain; charset=utf-8\r\n"));
        assert!(raw.contains(
            "Content-Transfer-Encoding: 8bit\r\n\r\n{\r\n  \"@type\": \"FoodEstablishmentReservation\"\r\n}\r\n------=_Part_3_0--\r\n"
        ));
    }

    #[test]
    fn test_wire_form_reads_back() {
        let parsed = Message::parse(&booking().to_rfc5322().unwrap()).unwrap();
        assert!(parsed.is_multipart().unwrap());
        assert_eq!(parsed.subject(), Some("Booking"));
        assert_eq!(parsed.parts.len(), 2);
        assert_eq!(parsed.text_part().unwrap(), "Table for two\r\n");
        assert_eq!(
            parsed.text_of_type("application/ld+json").unwrap(),
            "{\r\n  \"@type\": \"FoodEstablishmentReservation\"\r\n}"
        );
        assert!(matches!(parsed.html_part(), Err(Error::MissingPart(_))));
    }

    #[test]
    fn test_boundary_text_inside_part_is_not_a_delimiter() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=sep\r\n\r\n",
            "preamble\r\n",
            "--sep\r\nContent-Type: text/plain\r\n\r\nquote: --sep is the marker\r\n",
            "--sep--\r\nepilogue\r\n"
        );
        let parsed = Message::parse(raw).unwrap();
        assert_eq!(parsed.parts.len(), 1);
        assert_eq!(parsed.text_part().unwrap(), "quote: --sep is the marker");
    }

    #[test]
    fn test_single_part_with_lf_endings() {
        let parsed = Message::parse("From: a@example.org\nSubject: hi\n\nline one\n").unwrap();
        assert_eq!(parsed.from(), Some("a@example.org"));
        assert_eq!(parsed.body_text().unwrap(), "line one\n");
        assert!(parsed.html_part().is_err());
    }

    #[test]
    fn test_multipart_errors() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "multipart/alternative");
        let message = Message::multipart(headers, vec![Part::new(Headers::new(), Vec::new())]);
        assert!(matches!(message.to_bytes(), Err(Error::NoBoundary)));

        let open = "Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nbody\r\n";
        assert!(matches!(Message::parse(open), Err(Error::Multipart(_))));
    }
}
