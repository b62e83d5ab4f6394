use crate::aliases::AliasTable;
use crate::coerce::{coerce_points, split_name, truthy};
use crate::{Badges, CanonicalContact, Preferences, RawRecord};
use tracing::debug;

/// Normalize a contact record with the built-in alias table
pub fn normalize_contact(raw: &RawRecord) -> CanonicalContact {
    normalize_contact_with(raw, &AliasTable::contact_default())
}

pub fn normalize_contact_with(raw: &RawRecord, table: &AliasTable) -> CanonicalContact {
    let get = |field: &str| table.resolve_or_empty(raw, field);

    let mut first = table.resolve(raw, "first").map(str::to_string);
    let mut last = table.resolve(raw, "last").map(str::to_string);
    if first.is_none() || last.is_none() {
        if let Some(full) = table.resolve(raw, "name") {
            let (split_first, split_last) = split_name(full);
            first.get_or_insert(split_first);
            last.get_or_insert(split_last);
        }
    }

    let locker = get("locker");
    let locker_badge = match table.resolve(raw, "lockerBadge") {
        Some(flag) => truthy(flag),
        None => truthy(&locker),
    };

    CanonicalContact {
        id: get("id"),
        first: first.unwrap_or_default(),
        last: last.unwrap_or_default(),
        aka: get("aka"),
        email: get("email"),
        phone: get("phone"),
        birthday: get("birthday"),
        points: table.resolve(raw, "points").map(coerce_points).unwrap_or(0),
        last_purchase: get("lastPurchase"),
        regular: get("regular"),
        company: get("company"),
        notes: get("notes"),
        labels: get("labels"),
        preferences: Preferences {
            ring_pref: get("ringPref"),
            fav_brand_1: get("favBrand1"),
            fav_brand_2: get("favBrand2"),
            fav_brand_3: get("favBrand3"),
            fav_cigar_1: get("favCigar1"),
            fav_cigar_2: get("favCigar2"),
            fav_cigar_3: get("favCigar3"),
        },
        badges: Badges {
            military: table.resolve(raw, "military").map(truthy).unwrap_or(false),
            responder: table.resolve(raw, "responder").map(truthy).unwrap_or(false),
            locker: locker_badge,
        },
        locker,
    }
}

/// Normalize a whole contact document.
///
/// Blank records are skipped. Contacts without an id get the 1-based
/// position of their record in `records`.
pub fn normalize_contacts(records: &[RawRecord], table: &AliasTable) -> Vec<CanonicalContact> {
    let contacts: Vec<CanonicalContact> = records
        .iter()
        .enumerate()
        .filter(|(_, raw)| !raw.is_blank())
        .map(|(idx, raw)| CanonicalContact {
            id: contact_id_at(raw, idx, table),
            ..normalize_contact_with(raw, table)
        })
        .collect();

    debug!(
        "Normalized {} contacts from {} records",
        contacts.len(),
        records.len()
    );
    contacts
}

/// Id a contact carries inside a document: its own id, else its 1-based
/// position in the document.
pub fn contact_id_at(raw: &RawRecord, position: usize, table: &AliasTable) -> String {
    table
        .resolve(raw, "id")
        .map(str::to_string)
        .unwrap_or_else(|| (position + 1).to_string())
}

impl CanonicalContact {
    /// Flatten into a record keyed by the canonical field names
    pub fn to_raw_record(&self) -> RawRecord {
        let bool_text = |b: bool| if b { "true" } else { "false" };
        let p = &self.preferences;
        vec![
            ("id", self.id.clone()),
            ("first", self.first.clone()),
            ("last", self.last.clone()),
            ("aka", self.aka.clone()),
            ("email", self.email.clone()),
            ("phone", self.phone.clone()),
            ("birthday", self.birthday.clone()),
            ("points", self.points.to_string()),
            ("lastPurchase", self.last_purchase.clone()),
            ("locker", self.locker.clone()),
            ("regular", self.regular.clone()),
            ("company", self.company.clone()),
            ("notes", self.notes.clone()),
            ("labels", self.labels.clone()),
            ("ringPref", p.ring_pref.clone()),
            ("favBrand1", p.fav_brand_1.clone()),
            ("favBrand2", p.fav_brand_2.clone()),
            ("favBrand3", p.fav_brand_3.clone()),
            ("favCigar1", p.fav_cigar_1.clone()),
            ("favCigar2", p.fav_cigar_2.clone()),
            ("favCigar3", p.fav_cigar_3.clone()),
            ("military", bool_text(self.badges.military).to_string()),
            ("responder", bool_text(self.badges.responder).to_string()),
            ("lockerBadge", bool_text(self.badges.locker).to_string()),
        ]
        .into_iter()
        .collect()
    }

    /// Case-insensitive match on email
    pub fn matches_email(&self, email: &str) -> bool {
        let email = email.trim();
        !email.is_empty() && self.email.eq_ignore_ascii_case(email)
    }

    /// Case-insensitive match on first + last name, and on aka when given
    pub fn matches_name(&self, first: &str, last: &str, aka: Option<&str>) -> bool {
        let same = |a: &str, b: &str| a.trim().to_lowercase() == b.trim().to_lowercase();
        if !same(&self.first, first) || !same(&self.last, last) {
            return false;
        }
        match aka.map(str::trim).filter(|a| !a.is_empty()) {
            Some(aka) => same(&self.aka, aka),
            None => true,
        }
    }
}
