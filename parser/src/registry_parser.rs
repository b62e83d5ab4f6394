use crate::base_parser::{detect_format, FormatHint, Parser};
use crate::parsers::all_parsers;
use crate::{ParseError, RawRecord};
use std::io::{Cursor, Read};
use tracing::{debug, error, info, warn};

/// ParserRegistry - manages available record sources and auto-detects format
///
/// To add a new source, modify `parsers.rs`; this file stays unchanged.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Create a new registry with all parsers from the central registry
    pub fn new() -> Self {
        info!("Initializing ParserRegistry");
        let parsers = all_parsers();

        info!(
            "Registered {} parsers: {}",
            parsers.len(),
            parsers.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        Self { parsers }
    }

    /// Register a custom parser
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        info!("Registering custom parser: {}", parser.name());
        debug!("Parser supports extensions: {:?}", parser.extensions());
        self.parsers.push(parser);
    }

    /// Get parser by name
    pub fn get_parser(&self, name: &str) -> Option<&dyn Parser> {
        debug!("Looking up parser by name: {}", name);
        let result = self.parsers.iter().find(|p| p.name() == name).map(|p| p.as_ref());

        if result.is_none() {
            warn!("Parser not found: {}", name);
        }

        result
    }

    /// Get parser by file extension (case-insensitive)
    pub fn get_parser_by_extension(&self, extension: &str) -> Option<&dyn Parser> {
        debug!("Looking up parser by extension: {}", extension);
        let extension = extension.to_ascii_lowercase();
        let result = self
            .parsers
            .iter()
            .find(|p| p.extensions().contains(&extension.as_str()))
            .map(|p| p.as_ref());

        if let Some(parser) = result {
            info!("Selected parser '{}' for extension '.{}'", parser.name(), extension);
        } else {
            warn!("No parser found for extension '.{}'", extension);
        }

        result
    }

    /// Auto-detect and parse data
    pub fn parse_auto(&self, mut reader: Box<dyn Read>) -> Result<Vec<RawRecord>, ParseError> {
        info!("Starting auto-detection of document format");

        // Read a sample to detect format
        let mut sample = vec![0u8; 512];
        let bytes_read = read_sample(&mut reader, &mut sample)?;
        sample.truncate(bytes_read);

        debug!("Read {} byte sample for format detection", bytes_read);

        let format = detect_format(&sample);
        info!("Format hint from content analysis: {:?}", format);

        let parser = match format {
            FormatHint::Csv => self.get_parser("csv"),
            FormatHint::Json => self.get_parser("json"),
            FormatHint::Unknown => {
                if sample.iter().all(u8::is_ascii_whitespace) {
                    let mut rest = Vec::new();
                    reader.read_to_end(&mut rest)?;
                    let Some(start) = rest.iter().position(|b| !b.is_ascii_whitespace()) else {
                        info!("Empty document, no records");
                        return Ok(Vec::new());
                    };
                    debug!("Skipped {} bytes of leading whitespace", bytes_read + start);
                    rest.drain(..start);
                    return self.parse_auto(Box::new(Cursor::new(rest)));
                }
                warn!("Format unknown, trying parsers individually");
                self.parsers
                    .iter()
                    .find(|p| {
                        let can_parse = p.can_parse(&sample);
                        debug!("Parser '{}' can_parse result: {}", p.name(), can_parse);
                        can_parse
                    })
                    .map(|p| p.as_ref())
            }
        };

        if let Some(parser) = parser {
            info!("Selected parser: {}", parser.name());
            // Combine sample with rest of reader
            let combined = Box::new(CombinedReader::new(sample, reader));
            parser.parse(combined)
        } else {
            error!("Unable to detect format - no suitable parser found");
            Err(ParseError::UnknownFormat)
        }
    }

    /// Parse with explicit format hint (filename extension)
    pub fn parse_with_hint(
        &self,
        reader: Box<dyn Read>,
        filename: &str,
    ) -> Result<Vec<RawRecord>, ParseError> {
        info!("Parsing document with hint: {}", filename);

        let extension = match filename.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "",
        };
        debug!("Extracted extension: '{}'", extension);

        if let Some(parser) = self.get_parser_by_extension(extension) {
            info!("Using parser '{}' for '{}'", parser.name(), filename);
            parser.parse(reader)
        } else {
            warn!("No parser found for extension '{}', falling back to auto-detection", extension);
            self.parse_auto(reader)
        }
    }

    /// Parse an in-memory document, using the key's extension when it has one
    pub fn parse_bytes(&self, data: Vec<u8>, filename: &str) -> Result<Vec<RawRecord>, ParseError> {
        self.parse_with_hint(Box::new(Cursor::new(data)), filename)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill `buf` as far as the reader allows; short reads are not end of input
fn read_sample(reader: &mut Box<dyn Read>, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Helper to combine sample bytes with remaining reader
struct CombinedReader {
    sample: Cursor<Vec<u8>>,
    reader: Box<dyn Read>,
    reading_sample: bool,
}

impl CombinedReader {
    fn new(sample: Vec<u8>, reader: Box<dyn Read>) -> Self {
        Self {
            sample: Cursor::new(sample),
            reader,
            reading_sample: true,
        }
    }
}

impl Read for CombinedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.reading_sample {
            let bytes_read = self.sample.read(buf)?;
            if bytes_read == 0 {
                // Sample exhausted, switch to underlying reader
                self.reading_sample = false;
                self.reader.read(buf)
            } else {
                Ok(bytes_read)
            }
        } else {
            self.reader.read(buf)
        }
    }
}
