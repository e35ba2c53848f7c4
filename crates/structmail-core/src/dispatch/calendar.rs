//! Calendar export of event payloads (iCalendar, RFC 5545).

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::payload::{StructuredObject, object_type, string_property};

const PRODID: &str = "-//structmail//SML calendar export//EN";
const MAX_LINE_OCTETS: usize = 75;

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A point in time as written in a calendar property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// Absolute instant.
    Utc(DateTime<Utc>),
    /// Local time without zone.
    Floating(NaiveDateTime),
    /// All-day date.
    Date(NaiveDate),
}

impl EventTime {
    /// Parses an ISO 8601 date or date-time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateParse`] if no supported format matches.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(Self::Utc(dt.with_timezone(&Utc)));
        }
        if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%z") {
            return Ok(Self::Utc(dt.with_timezone(&Utc)));
        }
        for format in LOCAL_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(Self::Floating(dt));
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Self::Date)
            .map_err(|e| Error::DateParse(format!("{text:?}: {e}")))
    }

    /// Parses an iCalendar `DATE` or `DATE-TIME` value.
    ///
    /// Zone-qualified local times (`TZID=`) are read as floating.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DateParse`] if the value is neither form.
    pub fn parse_ics(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some(utc) = value.strip_suffix('Z') {
            if let Ok(dt) = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S") {
                return Ok(Self::Utc(dt.and_utc()));
            }
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
            return Ok(Self::Floating(dt));
        }
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(Self::Date)
            .map_err(|e| Error::DateParse(format!("{value:?}: {e}")))
    }

    /// ISO 8601 text as used by `startDate`/`endDate`.
    #[must_use]
    pub fn to_iso(&self) -> String {
        match self {
            Self::Utc(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            Self::Floating(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    fn property(&self, name: &str) -> String {
        match self {
            Self::Utc(dt) => format!("{name}:{}", dt.format("%Y%m%dT%H%M%SZ")),
            Self::Floating(dt) => format!("{name}:{}", dt.format("%Y%m%dT%H%M%S")),
            Self::Date(d) => format!("{name};VALUE=DATE:{}", d.format("%Y%m%d")),
        }
    }
}

/// An event derived from a structured object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalendarEvent {
    /// Unique identifier.
    pub uid: String,
    /// Title.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Related web page.
    pub url: Option<String>,
    /// Venue.
    pub location: Option<String>,
    /// Start.
    pub start: Option<EventTime>,
    /// End.
    pub end: Option<EventTime>,
}

impl CalendarEvent {
    /// Maps a structured object to an event.
    ///
    /// Unparsable dates are logged and left out.
    #[must_use]
    pub fn from_object(object: &StructuredObject) -> Self {
        let uid = string_property(object, "@id").map_or_else(|| derived_uid(object), str::to_string);
        let summary = string_property(object, "name")
            .or_else(|| object_type(object))
            .map(str::to_string);

        Self {
            uid,
            summary,
            description: string_property(object, "description").map(str::to_string),
            url: string_property(object, "url").map(str::to_string),
            location: location(object),
            start: time_property(object, &["startDate", "startTime"]),
            end: time_property(object, &["endDate", "endTime"]),
        }
    }

    /// Reads the first `VEVENT` of an iCalendar document.
    ///
    /// Returns `None` when the document has no event. Unknown properties
    /// are ignored and unparsable dates are logged and left out.
    #[must_use]
    pub fn from_ics(text: &str) -> Option<Self> {
        let mut event: Option<Self> = None;
        for line in unfold(text) {
            let Some((head, value)) = line.split_once(':') else {
                continue;
            };
            let name = head.split(';').next().unwrap_or_default().to_ascii_uppercase();
            let vevent = value.eq_ignore_ascii_case("VEVENT");
            if let Some(current) = event.as_mut() {
                if name == "END" && vevent {
                    break;
                }
                current.read_property(&name, value);
            } else if name == "BEGIN" && vevent {
                event = Some(Self::default());
            }
        }
        event
    }

    fn read_property(&mut self, name: &str, value: &str) {
        match name {
            "UID" => self.uid = unescape_text(value),
            "SUMMARY" => self.summary = Some(unescape_text(value)),
            "DESCRIPTION" => self.description = Some(unescape_text(value)),
            "LOCATION" => self.location = Some(unescape_text(value)),
            "URL" => self.url = Some(value.trim().to_string()),
            "DTSTART" | "DTEND" => match EventTime::parse_ics(value) {
                Ok(time) if name == "DTSTART" => self.start = Some(time),
                Ok(time) => self.end = Some(time),
                Err(e) => tracing::warn!("Ignoring {} of calendar attachment: {e}", name),
            },
            _ => {}
        }
    }

    /// The event as a schema.org `Event` object.
    #[must_use]
    pub fn to_object(&self) -> StructuredObject {
        let mut object = Map::new();
        object.insert("@context".into(), json!("https://schema.org"));
        object.insert("@type".into(), json!("Event"));
        if !self.uid.is_empty() {
            object.insert("@id".into(), json!(self.uid));
        }
        if let Some(summary) = &self.summary {
            object.insert("name".into(), json!(summary));
        }
        if let Some(description) = &self.description {
            object.insert("description".into(), json!(description));
        }
        if let Some(start) = &self.start {
            object.insert("startDate".into(), json!(start.to_iso()));
        }
        if let Some(end) = &self.end {
            object.insert("endDate".into(), json!(end.to_iso()));
        }
        if let Some(location) = &self.location {
            object.insert(
                "location".into(),
                json!({"@type": "Place", "name": location}),
            );
        }
        if let Some(url) = &self.url {
            object.insert("url".into(), json!(url));
        }
        object
    }

    /// Serializes the event as an iCalendar document with CRLF line endings.
    #[must_use]
    pub fn to_ics(&self, stamp: DateTime<Utc>) -> String {
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{PRODID}"),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", escape_text(&self.uid)),
            format!("DTSTAMP:{}", stamp.format("%Y%m%dT%H%M%SZ")),
        ];
        if let Some(start) = &self.start {
            lines.push(start.property("DTSTART"));
        }
        if let Some(end) = &self.end {
            lines.push(end.property("DTEND"));
        }
        for (name, value) in [
            ("SUMMARY", &self.summary),
            ("DESCRIPTION", &self.description),
            ("LOCATION", &self.location),
        ] {
            if let Some(value) = value {
                lines.push(format!("{name}:{}", escape_text(value)));
            }
        }
        if let Some(url) = &self.url {
            lines.push(format!("URL:{url}"));
        }
        lines.push("END:VEVENT".to_string());
        lines.push("END:VCALENDAR".to_string());

        let mut out = String::new();
        for line in &lines {
            let _ = write!(out, "{}\r\n", fold_line(line));
        }
        out
    }
}

fn time_property(object: &StructuredObject, keys: &[&str]) -> Option<EventTime> {
    let text = keys.iter().find_map(|key| string_property(object, key))?;
    match EventTime::parse(text) {
        Ok(time) => Some(time),
        Err(e) => {
            tracing::error!("Omitting {} from calendar event: {e}", keys[0]);
            None
        }
    }
}

fn location(object: &StructuredObject) -> Option<String> {
    match object.get("location")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(place) => string_property(place, "name").map(str::to_string),
        _ => None,
    }
}

fn derived_uid(object: &StructuredObject) -> String {
    let json = serde_json::to_string(object).unwrap_or_default();
    let digest = hex::encode(Sha256::digest(json.as_bytes()));
    format!("{}@structmail", &digest[..32])
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }
    out
}

/// Joins folded content lines back together.
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
        if let (Some(continued), Some(last)) = (raw.strip_prefix([' ', '\t']), lines.last_mut()) {
            last.push_str(continued);
        } else if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }
    lines
}

/// Folds a content line so that no physical line exceeds 75 octets.
fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out
}
