use crate::{base_parser::Parser, tabular, ParseError, RawRecord};
use std::io::Read;
use tracing::{error, info};

/// CSV parser - spreadsheet exports with a header row
pub struct CsvParser;

impl Parser for CsvParser {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "txt"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let sample = String::from_utf8_lossy(data);
        let first_line = sample.lines().next().unwrap_or("");

        // Header row with at least one delimiter, and not a JSON document
        !first_line.trim_start().starts_with(['[', '{']) && first_line.contains(',')
    }

    fn parse(&self, mut reader: Box<dyn Read>) -> Result<Vec<RawRecord>, ParseError> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        let text = match std::str::from_utf8(&buffer) {
            Ok(text) => text,
            Err(e) => {
                error!("CSV input is not valid UTF-8: {}", e);
                return Err(e.into());
            }
        };
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let records = tabular::parse_records(text);
        info!("CSV parsing complete: {} records", records.len());
        Ok(records)
    }
}
