/// Central parser registration module
///
/// Every record source the registry knows about is listed in
/// `all_parsers()`. A new document format only needs its parser file, an
/// export in lib.rs, and one line below.

use crate::base_parser::Parser;
use crate::{CsvParser, JsonParser};
use tracing::info;

/// Returns a vector of all available parsers, in detection priority order.
pub fn all_parsers() -> Vec<Box<dyn Parser>> {
    info!("Initializing parser collection");

    vec![
        Box::new(JsonParser) as Box<dyn Parser>,
        Box::new(CsvParser) as Box<dyn Parser>,
    ]
}
