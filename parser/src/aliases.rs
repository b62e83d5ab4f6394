use crate::RawRecord;
use serde::{Deserialize, Serialize};

/// Where to look for one canonical field in an arbitrary record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: String,
    /// Candidate source headers, highest priority first
    pub aliases: Vec<String>,
    /// Case-insensitive substring tried over all headers when no alias hits
    #[serde(default)]
    pub token: Option<String>,
}

impl FieldSpec {
    pub fn new(field: &str, aliases: &[&str], token: Option<&str>) -> Self {
        Self {
            field: field.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            token: token.map(str::to_string),
        }
    }

    fn claims(&self, header: &str) -> bool {
        let header = header.trim();
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(header))
    }
}

/// Ordered alias configuration for one entity.
///
/// Tables are plain data: the default contact and inventory tables below can
/// be replaced wholesale (for example from a JSON file) and handed to the
/// `*_with` normalizers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AliasTable {
    pub fields: Vec<FieldSpec>,
}

impl AliasTable {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn spec(&self, field: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|s| s.field == field)
    }

    /// Resolve `field` against `raw`, returning the trimmed, non-blank value.
    ///
    /// Order: aliases with exact header match, then aliases ignoring case,
    /// then the substring token over headers not claimed by another field.
    pub fn resolve<'a>(&self, raw: &'a RawRecord, field: &str) -> Option<&'a str> {
        let spec = self.spec(field)?;

        let non_blank = |v: &'a str| {
            let v = v.trim();
            (!v.is_empty()).then_some(v)
        };

        for alias in &spec.aliases {
            if let Some(v) = raw.get(alias).and_then(non_blank) {
                return Some(v);
            }
        }

        for alias in &spec.aliases {
            let hit = raw
                .iter()
                .filter(|(k, _)| k.trim().eq_ignore_ascii_case(alias))
                .find_map(|(_, v)| non_blank(v));
            if hit.is_some() {
                return hit;
            }
        }

        let token = spec.token.as_deref()?.to_lowercase();
        raw.iter()
            .filter(|(k, _)| k.to_lowercase().contains(&token))
            .filter(|(k, _)| !self.claimed_elsewhere(field, k))
            .find_map(|(_, v)| non_blank(v))
    }

    pub fn resolve_or_empty(&self, raw: &RawRecord, field: &str) -> String {
        self.resolve(raw, field).unwrap_or_default().to_string()
    }

    /// Header of the first alias of `field` present in `raw`, matched the
    /// same way `resolve` matches aliases.
    pub fn present_header<'a>(&self, raw: &'a RawRecord, field: &str) -> Option<&'a str> {
        let spec = self.spec(field)?;
        spec.aliases.iter().find_map(|alias| {
            raw.keys()
                .find(|k| *k == alias)
                .or_else(|| raw.keys().find(|k| k.trim().eq_ignore_ascii_case(alias)))
        })
    }

    fn claimed_elsewhere(&self, field: &str, header: &str) -> bool {
        self.fields
            .iter()
            .any(|s| s.field != field && s.claims(header))
    }

    /// Default table for loyalty contacts
    pub fn contact_default() -> Self {
        Self::new(vec![
            FieldSpec::new("id", &["id", "ID", "Id", "Customer ID"], None),
            FieldSpec::new(
                "first",
                &["first", "First Name", "first_name", "First", "FName", "firstName"],
                Some("first"),
            ),
            FieldSpec::new(
                "last",
                &["last", "Last Name", "last_name", "Last", "LName", "lastName"],
                Some("last"),
            ),
            FieldSpec::new(
                "name",
                &["name", "Name", "Full Name", "full_name", "Customer", "Client"],
                None,
            ),
            FieldSpec::new(
                "aka",
                &["aka", "Nickname “aka”", "Nickname \"aka\"", "Nickname", "AKA"],
                Some("nick"),
            ),
            FieldSpec::new("email", &["email", "Email", "E-mail", "Email Address"], Some("mail")),
            FieldSpec::new(
                "phone",
                &["phone", "Phone", "Mobile", "mobile", "Cell", "Phone Number"],
                Some("phone"),
            ),
            FieldSpec::new("birthday", &["birthday", "Birthday", "DOB", "Birth Date"], Some("birth")),
            FieldSpec::new(
                "points",
                &["points", "Points", "Rewards", "Pts", "total_points"],
                Some("point"),
            ),
            FieldSpec::new(
                "lastPurchase",
                &["lastPurchase", "Last Purchase", "last_purchase"],
                Some("purchase"),
            ),
            FieldSpec::new("locker", &["locker", "Locker", "Locker #", "Locker Number"], Some("locker")),
            FieldSpec::new("regular", &["regular", "Regular"], Some("regular")),
            FieldSpec::new("company", &["company", "Company", "Business"], Some("company")),
            FieldSpec::new("notes", &["notes", "Notes", "Note"], Some("note")),
            FieldSpec::new("labels", &["labels", "Labels", "Tags"], Some("label")),
            FieldSpec::new("ringPref", &["ringPref", "Ring Pref", "ring_pref", "Ring Gauge"], Some("ring")),
            FieldSpec::new("favBrand1", &["favBrand1", "Fav brand 1", "fav_brand_1", "Favorite Brand"], None),
            FieldSpec::new("favBrand2", &["favBrand2", "Fav brand 2", "fav_brand_2"], None),
            FieldSpec::new("favBrand3", &["favBrand3", "Fav brand 3", "fav_brand_3"], None),
            FieldSpec::new(
                "favCigar1",
                &["favCigar1", "Fav cigar", "Fav cigar 1", "fav_cigar_1", "Favorite Cigar"],
                None,
            ),
            FieldSpec::new("favCigar2", &["favCigar2", "Fav cigar 2", "fav_cigar_2"], None),
            FieldSpec::new("favCigar3", &["favCigar3", "Fav cigar 3", "fav_cigar_3"], None),
            FieldSpec::new("military", &["military", "Military", "Veteran"], Some("military")),
            FieldSpec::new(
                "responder",
                &["responder", "First Responder", "first_responder"],
                Some("responder"),
            ),
            FieldSpec::new("lockerBadge", &["lockerBadge", "Locker Member"], None),
        ])
    }

    /// Default table for inventory rows
    pub fn inventory_default() -> Self {
        Self::new(vec![
            FieldSpec::new("id", &["id", "ID", "Sku", "SKU"], None),
            FieldSpec::new("brand", &["brand", "Brand", "Manufacturer"], Some("brand")),
            FieldSpec::new("item", &["item", "Item", "name", "Name", "Cigar"], Some("item")),
            FieldSpec::new("vitola", &["vitola", "Vitola", "Size"], Some("vitola")),
            FieldSpec::new("price", &["price", "Price"], Some("price")),
            FieldSpec::new("inventory", &["inventory", "Inventory", "Qty", "Stock"], Some("stock")),
            FieldSpec::new("brand_slug", &["brand_slug", "Brand Slug", "brandSlug"], None),
            FieldSpec::new("brand_icon", &["brand_icon", "Brand Icon", "icon"], None),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_first_alias_wins() {
        let table = AliasTable::contact_default();
        let raw = record(&[("Last", "Jones"), ("Last Name", "Smith")]);
        assert_eq!(table.resolve(&raw, "last"), Some("Smith"));
    }

    #[test]
    fn test_blank_alias_falls_through() {
        let table = AliasTable::contact_default();
        let raw = record(&[("Last Name", "  "), ("Last", "Jones")]);
        assert_eq!(table.resolve(&raw, "last"), Some("Jones"));
    }

    #[test]
    fn test_case_insensitive_alias_after_exact() {
        let table = AliasTable::contact_default();
        let raw = record(&[("LAST NAME", "Smith")]);
        assert_eq!(table.resolve(&raw, "last"), Some("Smith"));
    }

    #[test]
    fn test_substring_token_fallback() {
        let table = AliasTable::contact_default();
        let raw = record(&[("Customer Last-Name", " Doe ")]);
        assert_eq!(table.resolve(&raw, "last"), Some("Doe"));
    }

    #[test]
    fn test_substring_skips_headers_owned_by_other_fields() {
        let table = AliasTable::contact_default();
        let raw = record(&[("First Responder", "Y"), ("Last Purchase", "2024-01-02")]);
        assert_eq!(table.resolve(&raw, "first"), None);
        assert_eq!(table.resolve(&raw, "last"), None);
        assert_eq!(table.resolve(&raw, "responder"), Some("Y"));
    }

    #[test]
    fn test_unknown_field_resolves_to_none() {
        let table = AliasTable::contact_default();
        let raw = record(&[("x", "y")]);
        assert_eq!(table.resolve(&raw, "nope"), None);
        assert_eq!(table.resolve_or_empty(&raw, "nope"), "");
    }

    #[test]
    fn test_present_header_reports_source_key() {
        let table = AliasTable::contact_default();
        let raw = record(&[("Rewards", ""), ("Email", "a@b.c")]);
        assert_eq!(table.present_header(&raw, "points"), Some("Rewards"));
        assert_eq!(table.present_header(&raw, "phone"), None);
    }

    #[test]
    fn test_table_loads_from_json() {
        let json = r#"{"fields":[{"field":"last","aliases":["Surname"]}]}"#;
        let table: AliasTable = serde_json::from_str(json).unwrap();
        let raw = record(&[("Surname", "Doe")]);
        assert_eq!(table.resolve(&raw, "last"), Some("Doe"));
        assert_eq!(table.spec("last").unwrap().token, None);
    }
}
