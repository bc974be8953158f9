use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use html2text::render::TrivialDecorator;
use regex::Regex;

use super::common::{canonical_timestamp, NormalizedRecord, RawMessage};
use crate::error::NormalizeError;

/// Google Sheets rejects cells above 50k characters, keep a margin
pub const DEFAULT_MAX_BODY_LEN: usize = 48_000;

pub const TRUNCATION_MARKER: &str = "\n...[truncated due to size limit]";

const HTML_MARKERS: [&str; 3] = ["<html", "<div", "<p"];

// Wide enough that html2text never re-wraps a paragraph before we clamp it
const HTML_WRAP_WIDTH: usize = 100_000;

/// Turns mailbox messages into sheet records
#[derive(Debug, Clone, Copy)]
pub struct ContentNormalizer {
    max_body_len: usize,
}

impl Default for ContentNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_LEN)
    }
}

impl ContentNormalizer {
    pub fn new(max_body_len: usize) -> Self {
        ContentNormalizer { max_body_len }
    }

    pub fn max_body_len(&self) -> usize {
        self.max_body_len
    }

    /// Normalize every field of a message.
    ///
    /// Fails only when the date cannot be parsed; the caller decides whether to
    /// skip the message or abort.
    pub fn normalize(&self, raw: &RawMessage) -> Result<NormalizedRecord, NormalizeError> {
        debug!("Normalizing message {}", raw.id);

        let date = parse_date(&raw.date_raw)?;

        Ok(NormalizedRecord {
            id: raw.id.clone(),
            from: extract_sender_address(&raw.sender_raw),
            subject: raw
                .subject_raw
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            date,
            body: clean_body(&raw.body_raw, self.max_body_len),
        })
    }
}

/// Normalize with the default body limit
pub fn normalize(raw: &RawMessage) -> Result<NormalizedRecord, NormalizeError> {
    ContentNormalizer::default().normalize(raw)
}

/// Extract the bare address from "Name <address>" forms.
/// No validation: anything without brackets is returned trimmed.
pub fn extract_sender_address(raw: &str) -> String {
    if raw.contains('<') && raw.contains('>') {
        if let Ok(re) = Regex::new(r"<(.+?)>") {
            if let Some(address) = re.captures(raw).and_then(|caps| caps.get(1)) {
                return address.as_str().to_string();
            }
        }
    }
    raw.trim().to_string()
}

/// Parse an RFC 2822 date, tolerating trailing comments such as "(UTC)" and
/// a weekday that does not match the date
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, NormalizeError> {
    let trimmed = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(date);
    }

    let without_comments = match Regex::new(r"\([^)]*\)") {
        Ok(re) => re.replace_all(trimmed, " "),
        Err(_) => Cow::Borrowed(trimmed),
    };
    // The weekday is redundant, chrono rejects it when it disagrees with the date
    let without_weekday = match Regex::new(r"^\s*[A-Za-z]{3},") {
        Ok(re) => re.replace(&without_comments, " ").into_owned(),
        Err(_) => without_comments.into_owned(),
    };
    let collapsed = without_weekday.split_whitespace().collect::<Vec<_>>().join(" ");

    DateTime::parse_from_rfc2822(&collapsed).map_err(|e| {
        debug!("Date '{}' rejected: {}", raw, e);
        NormalizeError::DateParse {
            raw: raw.to_string(),
        }
    })
}

/// Convert an RFC 2822 date to ISO-8601 with offset
pub fn normalize_date(raw: &str) -> Result<String, NormalizeError> {
    parse_date(raw).map(|date| canonical_timestamp(&date))
}

/// Strip HTML when present, drop blank lines, trim every line and clamp the length.
pub fn clean_body(raw: &str, max_len: usize) -> String {
    let text = if looks_like_html(raw) {
        html_to_text(raw)
    } else {
        Cow::Borrowed(raw)
    };

    let normalized = normalize_whitespace(&text);
    clamp(normalized, max_len)
}

fn looks_like_html(body: &str) -> bool {
    let lower = body.to_lowercase();
    HTML_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Visible text only: no markdown decoration, link footnotes or table borders.
/// Raw mode puts every table cell on its own line.
fn html_to_text(html: &str) -> Cow<'_, str> {
    let converted = html2text::config::with_decorator(TrivialDecorator::new())
        .raw_mode(true)
        .string_from_read(html.as_bytes(), HTML_WRAP_WIDTH);

    match converted {
        Ok(text) => Cow::Owned(text),
        Err(e) => {
            warn!("Unable to convert HTML body, keeping it as plain text: {}", e);
            Cow::Borrowed(html)
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clamp(text: String, max_len: usize) -> String {
    let len = text.chars().count();
    if len <= max_len {
        return text;
    }

    debug!("Body of {} chars clamped to {}", len, max_len);

    let keep = max_len.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut clamped: String = text.chars().take(keep).collect();
    clamped.push_str(TRUNCATION_MARKER);

    if keep == 0 {
        // limit smaller than the marker itself
        clamped = clamped.chars().take(max_len).collect();
    }
    clamped
}
