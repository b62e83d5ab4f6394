use crate::{base_parser::Parser, ParseError, RawRecord};
use serde_json::Value;
use std::io::Read;
use tracing::{error, info, warn};

/// Keys under which a wrapping object may carry its record array
const WRAPPER_KEYS: [&str; 3] = ["contacts", "items", "data"];

/// JSON parser - handles an array of flat objects
/// Example: [{"Last Name": "Doe", ...}, {"Last Name": "Roe", ...}]
/// or the same array wrapped as {"contacts": [...]}
pub struct JsonParser;

impl Parser for JsonParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let sample = String::from_utf8_lossy(data);
        let trimmed = sample.trim();

        trimmed.starts_with('[') || trimmed.starts_with('{')
    }

    fn parse(&self, mut reader: Box<dyn Read>) -> Result<Vec<RawRecord>, ParseError> {
        info!("Starting JSON document parsing");
        let mut buffer = Vec::new();

        if let Err(e) = reader.read_to_end(&mut buffer) {
            error!("Failed to read JSON data: {}", e);
            return Err(e.into());
        }

        info!("Read {} bytes of JSON data", buffer.len());

        let document: Value = match serde_json::from_slice(&buffer) {
            Ok(document) => document,
            Err(e) => {
                error!("Failed to parse JSON document: {}", e);
                return Err(e.into());
            }
        };

        let records = records_from_value(&document)?;
        info!("JSON parsing complete: {} records parsed", records.len());
        Ok(records)
    }
}

/// Convert an already-decoded JSON document into records.
///
/// Accepts an array of objects, or an object holding such an array under
/// `contacts`, `items` or `data`. Array elements that are not objects are
/// skipped.
pub fn records_from_value(document: &Value) -> Result<Vec<RawRecord>, ParseError> {
    let array = match document {
        Value::Array(array) => array,
        Value::Object(object) => WRAPPER_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                ParseError::UnsupportedJson("object without a record array".to_string())
            })?,
        other => {
            return Err(ParseError::UnsupportedJson(format!(
                "expected array or object, found {}",
                json_kind(other)
            )))
        }
    };

    let mut skipped = 0usize;
    let records: Vec<RawRecord> = array
        .iter()
        .filter_map(|element| match element.as_object() {
            Some(object) => Some(RawRecord::from_json_object(object)),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        warn!("Skipped {} non-object elements in JSON document", skipped);
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
