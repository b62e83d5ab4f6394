use crate::storage::{BlobStorage, StorageError, CONTACTS};
use loyalty_parser::coerce::coerce_points;
use loyalty_parser::{contact_id_at, normalize_contact_with, AliasTable, ParseError, ParserRegistry, RawRecord};
use tracing::{debug, info};

/// Primary contact document, rewritten by the points endpoints
pub const CONTACTS_JSON: &str = "contacts.json";
/// Spreadsheet export read when no JSON document exists yet
pub const CONTACTS_CSV: &str = "contacts.csv";

/// Header used for points when a record has none of the points aliases
const DEFAULT_POINTS_HEADER: &str = "Points";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to parse {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: ParseError,
    },
}

/// Raw contact records plus the key they were read from
pub struct ContactDocument {
    pub source: &'static str,
    pub records: Vec<RawRecord>,
}

/// Load `contacts.json`, falling back to `contacts.csv`; `None` when neither exists
pub fn load_contacts(
    storage: &BlobStorage,
    registry: &ParserRegistry,
) -> Result<Option<ContactDocument>, DocumentError> {
    let store = storage.store(CONTACTS);
    for key in [CONTACTS_JSON, CONTACTS_CSV] {
        if let Some(bytes) = store.get_bytes(key)? {
            let records = registry
                .parse_bytes(bytes, key)
                .map_err(|source| DocumentError::Parse {
                    key: key.to_string(),
                    source,
                })?;
            info!("Loaded {} contact records from {}", records.len(), key);
            return Ok(Some(ContactDocument { source: key, records }));
        }
    }
    Ok(None)
}

pub fn save_contacts(storage: &BlobStorage, records: &[RawRecord]) -> Result<(), StorageError> {
    storage.store(CONTACTS).set_json(CONTACTS_JSON, records)?;
    info!("Saved {} contact records to {}", records.len(), CONTACTS_JSON);
    Ok(())
}

/// Who to update: email wins, otherwise first + last (+ aka when given)
#[derive(Debug, Clone, Default)]
pub struct ContactLookup {
    pub email: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
    pub aka: Option<String>,
}

impl ContactLookup {
    fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    fn name(&self) -> Option<(&str, &str)> {
        let first = self.first.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let last = self.last.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some((first, last))
    }

    pub fn is_usable(&self) -> bool {
        self.email().is_some() || self.name().is_some()
    }

    /// Human-readable identifier for responses, from the matched contact
    pub fn identifier(&self, record: &RawRecord, table: &AliasTable) -> String {
        if let Some(email) = self.email() {
            return email.to_string();
        }
        let contact = normalize_contact_with(record, table);
        let name = format!("{} {}", contact.first, contact.last);
        if contact.aka.is_empty() {
            name
        } else {
            format!("{} ({})", name, contact.aka)
        }
    }
}

/// Index of the record matching `lookup`: by email first, then by name
pub fn find_contact(records: &[RawRecord], table: &AliasTable, lookup: &ContactLookup) -> Option<usize> {
    let contacts: Vec<_> = records.iter().map(|r| normalize_contact_with(r, table)).collect();

    if let Some(email) = lookup.email() {
        if let Some(idx) = contacts.iter().position(|c| c.matches_email(email)) {
            debug!("Matched contact {} by email", idx);
            return Some(idx);
        }
    }

    let (first, last) = lookup.name()?;
    let idx = contacts
        .iter()
        .position(|c| c.matches_name(first, last, lookup.aka.as_deref()));
    if let Some(idx) = idx {
        debug!("Matched contact {} by name", idx);
    }
    idx
}

/// Index of the record whose document id is `id` (explicit, else 1-based
/// position). Falls back to reading `id` as a 0-based array index.
pub fn find_contact_by_id(records: &[RawRecord], table: &AliasTable, id: &str) -> Option<usize> {
    let id = id.trim();
    records
        .iter()
        .enumerate()
        .find(|(idx, raw)| !raw.is_blank() && contact_id_at(raw, *idx, table) == id)
        .map(|(idx, _)| idx)
        .or_else(|| {
            id.parse::<usize>()
                .ok()
                .filter(|&idx| records.get(idx).map_or(false, |raw| !raw.is_blank()))
        })
}

/// Overwrite the points value under the record's own points header
pub fn set_points(record: &mut RawRecord, table: &AliasTable, points: u64) {
    let header = table
        .present_header(record, "points")
        .unwrap_or(DEFAULT_POINTS_HEADER)
        .to_string();
    record.insert(header, points.to_string());
}

/// Add `delta` to the record's points, never going below zero.
///
/// Writes `points` and `total_points` so both spellings agree. Returns the
/// new total.
pub fn add_points(record: &mut RawRecord, table: &AliasTable, delta: i64) -> u64 {
    let current = table.resolve(record, "points").map(coerce_points).unwrap_or(0);
    let next = if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    };
    record.insert("points", next.to_string());
    record.insert("total_points", next.to_string());
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().copied().collect()
    }

    fn people() -> Vec<RawRecord> {
        vec![
            record(&[("First Name", "Jane"), ("Last Name", "Doe"), ("Email", "jane@example.com"), ("Points", "10")]),
            record(&[("First Name", ""), ("Last Name", ""), ("Email", ""), ("Points", "")]),
            record(&[("First Name", "Rick"), ("Last Name", "Roe"), ("Nickname “aka”", "Smokey"), ("Rewards", "1.2k")]),
            record(&[("id", "c-9"), ("First Name", "Rick"), ("Last Name", "Roe"), ("Email", "rick@example.com")]),
        ]
    }

    #[test]
    fn test_find_by_email_then_name() {
        let table = AliasTable::contact_default();
        let records = people();

        let by_email = ContactLookup {
            email: Some("JANE@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(find_contact(&records, &table, &by_email), Some(0));

        let by_name = ContactLookup {
            email: Some("nobody@example.com".to_string()),
            first: Some("rick".to_string()),
            last: Some("ROE".to_string()),
            aka: None,
        };
        assert_eq!(find_contact(&records, &table, &by_name), Some(2));

        let by_aka = ContactLookup {
            aka: Some("nobody".to_string()),
            ..by_name.clone()
        };
        assert_eq!(find_contact(&records, &table, &by_aka), None);
    }

    #[test]
    fn test_find_by_id() {
        let table = AliasTable::contact_default();
        let records = people();
        assert_eq!(find_contact_by_id(&records, &table, "1"), Some(0));
        assert_eq!(find_contact_by_id(&records, &table, "3"), Some(2));
        assert_eq!(find_contact_by_id(&records, &table, "c-9"), Some(3));
        assert_eq!(find_contact_by_id(&records, &table, "4"), None);
        assert_eq!(find_contact_by_id(&records, &table, "nobody"), None);
    }

    #[test]
    fn test_find_by_id_falls_back_to_index() {
        let table = AliasTable::contact_default();
        let records = people();
        // "2" is nobody's id; index 2 is Rick
        assert_eq!(find_contact_by_id(&records, &table, "2"), Some(2));
        // index 1 is blank
        let mut short = records.clone();
        short.truncate(2);
        assert_eq!(find_contact_by_id(&short, &table, "1"), Some(0));
        assert_eq!(find_contact_by_id(&short, &table, "3"), None);
    }

    #[test]
    fn test_set_points_uses_existing_header() {
        let table = AliasTable::contact_default();
        let mut records = people();

        set_points(&mut records[2], &table, 50);
        assert_eq!(records[2].get("Rewards"), Some("50"));

        let mut bare = record(&[("Email", "x@y.z")]);
        set_points(&mut bare, &table, 7);
        assert_eq!(bare.get("Points"), Some("7"));
    }

    #[test]
    fn test_add_points_clamps_at_zero() {
        let table = AliasTable::contact_default();
        let mut records = people();

        assert_eq!(add_points(&mut records[2], &table, 25), 1225);
        assert_eq!(records[2].get("points"), Some("1225"));
        assert_eq!(records[2].get("total_points"), Some("1225"));

        assert_eq!(add_points(&mut records[0], &table, -100), 0);
        assert_eq!(records[0].get("points"), Some("0"));
    }

    #[test]
    fn test_add_points_keeps_large_balances() {
        let table = AliasTable::contact_default();
        let mut big = record(&[("points", "1e19")]);
        assert_eq!(add_points(&mut big, &table, 5), 10_000_000_000_000_000_005);

        let max_text = u64::MAX.to_string();
        let mut max = record(&[("points", max_text.as_str())]);
        assert_eq!(add_points(&mut max, &table, 5), u64::MAX);
        assert_eq!(add_points(&mut max, &table, i64::MIN), u64::MAX - i64::MIN.unsigned_abs());
    }

    #[test]
    fn test_identifier() {
        let table = AliasTable::contact_default();
        let records = people();
        let lookup = ContactLookup {
            first: Some("Rick".to_string()),
            last: Some("Roe".to_string()),
            ..Default::default()
        };
        assert_eq!(lookup.identifier(&records[2], &table), "Rick Roe (Smokey)");
        assert!(lookup.is_usable());
        assert!(!ContactLookup::default().is_usable());
    }
}
