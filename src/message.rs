use std::fmt;
use std::str::FromStr;

use mail_parser::Message;
use serde::{Deserialize, Serialize};

use crate::store::Status;

/// A header the operator chose to scan. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderField(String);

impl HeaderField {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `To`, `From` and `Cc`.
    pub fn defaults() -> Vec<HeaderField> {
        ["To", "From", "Cc"].into_iter().map(HeaderField::new).collect()
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, header_name: &str) -> bool {
        self.0.eq_ignore_ascii_case(header_name)
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HeaderField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_end_matches(':');
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(format!("invalid header name: {:?}", s));
        }
        Ok(HeaderField::new(name))
    }
}

/// Why a fetched message contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    FetchRejected(Status),
    EmptyBody,
    Unparseable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FetchRejected(status) => write!(f, "fetch rejected: {}", status),
            SkipReason::EmptyBody => write!(f, "fetch returned no message body"),
            SkipReason::Unparseable => write!(f, "message could not be parsed"),
        }
    }
}

/// Raw values of the selected headers of one message.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    headers: Vec<(HeaderField, String)>,
}

impl ParsedMessage {
    /// Raw, still encoded value of `field`, if the message carries it.
    pub fn header(&self, field: &HeaderField) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum MessageOutcome {
    Parsed(ParsedMessage),
    Skipped(SkipReason),
}

/// Parses a full message and keeps the first raw occurrence of every selected header.
pub fn parse_message(raw: &[u8], fields: &[HeaderField]) -> MessageOutcome {
    let parsed = match Message::parse(raw) {
        Some(parsed) => parsed,
        None => return MessageOutcome::Skipped(SkipReason::Unparseable),
    };
    if parsed.headers().is_empty() {
        return MessageOutcome::Skipped(SkipReason::Unparseable);
    }

    let mut message = ParsedMessage::default();
    for field in fields {
        let header = parsed.headers().iter().find(|h| field.matches(h.name()));
        if let Some(header) = header {
            let start = header.offset_start as usize;
            let end = header.offset_end as usize;
            if let Some(value) = raw.get(start..end) {
                let value = unfold(&String::from_utf8_lossy(value));
                message.headers.push((field.clone(), value));
            }
        }
    }

    MessageOutcome::Parsed(message)
}

/// Joins folded header lines: a line break followed by whitespace is removed.
pub fn unfold(value: &str) -> String {
    let mut unfolded = String::with_capacity(value.len());
    let mut lines = value.split('\n').peekable();
    while let Some(line) = lines.next() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        unfolded.push_str(line);
        if let Some(next) = lines.peek() {
            if !next.starts_with([' ', '\t']) {
                break;
            }
        }
    }
    unfolded.trim().to_string()
}
