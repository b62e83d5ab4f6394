// Parser crate for loyalty contact and inventory documents
// Tabular tokenizer, record sources behind a registry, and the normalizers
// that map arbitrary headers onto canonical entities

pub mod types;
pub mod base_parser;
pub mod parsers;
pub mod registry_parser;
pub mod tabular;

// Record sources
pub mod csv_parser;
pub mod json_parser;

// Normalization
pub mod aliases;
pub mod coerce;
pub mod contact;
pub mod inventory;

// Re-export main types
pub use types::*;
pub use base_parser::{FormatHint, Parser};
pub use registry_parser::ParserRegistry;

// Re-export parsers
pub use csv_parser::CsvParser;
pub use json_parser::JsonParser;

pub use aliases::{AliasTable, FieldSpec};
pub use contact::{contact_id_at, normalize_contact, normalize_contact_with, normalize_contacts};
pub use inventory::{normalize_inventory, normalize_inventory_item, normalize_inventory_item_with};
