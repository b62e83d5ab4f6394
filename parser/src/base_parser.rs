use crate::{ParseError, RawRecord};
use std::io::Read;

/// Base trait for every record source (CSV text, JSON documents, ...)
/// Uses Box<dyn Read> to be object-safe (dyn compatible)
pub trait Parser: Send + Sync {
    /// Returns the name of this parser (e.g., "csv", "json")
    fn name(&self) -> &'static str;

    /// Returns the file extensions this parser supports (e.g., ["csv", "txt"])
    fn extensions(&self) -> &'static [&'static str];

    /// Checks if this parser can handle the given data by inspecting content
    fn can_parse(&self, data: &[u8]) -> bool;

    /// Parse the whole document into raw records.
    /// Only decoding failures are errors; odd rows degrade to empty fields.
    fn parse(&self, reader: Box<dyn Read>) -> Result<Vec<RawRecord>, ParseError>;
}

/// Helper to detect format from content
pub fn detect_format(data: &[u8]) -> FormatHint {
    let sample = String::from_utf8_lossy(data);
    let trimmed = sample.trim_start_matches('\u{feff}').trim();

    if trimmed.is_empty() {
        return FormatHint::Unknown;
    }

    // JSON documents are an array of records or an object wrapping one
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return FormatHint::Json;
    }

    FormatHint::Csv
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Csv,
    Json,
    Unknown,
}
