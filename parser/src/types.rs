use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tokenized line of delimited input
pub type Row = Vec<String>;

/// Header-keyed mapping built from one data row (or one JSON object).
///
/// Entries keep document order. Inserting a header that already exists
/// replaces its value in place, so later duplicates win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    entries: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every value is empty after trimming
    pub fn is_blank(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.trim().is_empty())
    }

    /// Build a record from a decoded JSON object.
    ///
    /// Strings are taken as-is, `null` becomes `""`, and every other value
    /// is kept as its compact JSON text.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        object
            .iter()
            .map(|(k, v)| (k.clone(), json_value_text(v)))
            .collect()
    }

    pub fn to_json_object(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

fn json_value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Ok(RawRecord::from_json_object(&object))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub ring_pref: String,
    pub fav_brand_1: String,
    pub fav_brand_2: String,
    pub fav_brand_3: String,
    pub fav_cigar_1: String,
    pub fav_cigar_2: String,
    pub fav_cigar_3: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badges {
    pub military: bool,
    pub responder: bool,
    pub locker: bool,
}

/// Normalized loyalty contact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalContact {
    pub id: String,
    pub first: String,
    pub last: String,
    pub aka: String,
    pub email: String,
    pub phone: String,
    pub birthday: String,
    pub points: u64,
    pub last_purchase: String,
    pub locker: String,
    pub regular: String,
    pub company: String,
    pub notes: String,
    pub labels: String,
    pub preferences: Preferences,
    pub badges: Badges,
}

/// Normalized inventory row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalInventoryItem {
    pub id: String,
    pub brand: String,
    pub item: String,
    pub vitola: String,
    pub price: f64,
    pub inventory: u64,
    pub brand_slug: String,
    pub brand_icon: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Unsupported JSON document: {0}")]
    UnsupportedJson(String),
    #[error("Unable to detect format")]
    UnknownFormat,
    #[error("{0}")]
    Custom(String),
}

impl From<String> for ParseError {
    fn from(msg: String) -> Self {
        ParseError::Custom(msg)
    }
}

impl From<&str> for ParseError {
    fn from(msg: &str) -> Self {
        ParseError::Custom(msg.to_string())
    }
}
