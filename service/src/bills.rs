use crate::models::{
    value_number, value_text, BillInput, BillsResponse, HistoryEntry, RollupEntry, SavedBill, SavedLoyalty,
};
use crate::storage::{BlobStorage, BlobStore, StorageError, BILLS, LOYALTY, TRANSACTIONS};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

pub const CONFIRMED: &str = "confirmed";
const PENDING: &str = "pending";
const DEFAULT_METHOD: &str = "cash";

/// `YYYY-MM-DD` (UTC) for an RFC 3339 timestamp or a bare date; anything
/// else, including no input, yields the day of `now`.
pub fn day_key(input: Option<&str>, now: DateTime<Utc>) -> String {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc).date_naive())
                .ok()
                .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        })
        .unwrap_or_else(|| now.date_naive())
        .format("%Y-%m-%d")
        .to_string()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn non_negative(value: &Value) -> f64 {
    value_number(value).unwrap_or(0.0).max(0.0)
}

fn whole(value: &Value) -> i64 {
    value_number(value).map(|n| n.trunc() as i64).unwrap_or(0)
}

/// Compact form of a posted bill.
///
/// Amounts are clamped at zero and rounded to cents. Points are one per
/// pre-tax dollar (rounded) plus the cashier's manual adjustment.
pub fn compact_bill(bill: &BillInput, now: DateTime<Utc>) -> SavedBill {
    let subtotal = non_negative(&bill.subtotal);
    let points = (subtotal.round() as i64).saturating_add(whole(&bill.manual_delta));
    let loyalty = bill.loyalty.clone().unwrap_or_default();

    SavedBill {
        ts: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        items_count: whole(&bill.items_count),
        items: match &bill.items {
            Value::Array(items) => items.clone(),
            _ => Vec::new(),
        },
        subtotal: round_cents(subtotal),
        tax: round_cents(non_negative(&bill.tax)),
        total: round_cents(non_negative(&bill.total)),
        method: bill
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_METHOD)
            .to_string(),
        loyalty: SavedLoyalty {
            id: value_text(&loyalty.id),
            name: loyalty.name.trim().to_string(),
        },
        points,
    }
}

fn bill_key(confirmed: bool, day: &str) -> String {
    format!("{}:{}.json", if confirmed { CONFIRMED } else { PENDING }, day)
}

fn rollup_key(day: &str) -> String {
    format!("rollup:{}.json", day)
}

fn append<T: Serialize>(store: &BlobStore, key: &str, entry: &T) -> Result<usize, StorageError> {
    let mut entries: Vec<Value> = store.get_json(key)?.unwrap_or_default();
    let value = serde_json::to_value(entry).map_err(|source| StorageError::Json {
        key: key.to_string(),
        source,
    })?;
    entries.push(value);
    store.set_json(key, &entries)?;
    Ok(entries.len())
}

fn read_list(store: &BlobStore, key: &str) -> Result<Vec<Value>, StorageError> {
    Ok(store.get_json(key)?.unwrap_or_default())
}

/// Store a bill under today's key.
///
/// Any action other than `confirmed` saves a draft. Confirmed bills are also
/// added to the day's rollup and, when the bill names a loyalty customer,
/// to that customer's running points total and daily history.
pub fn record_bill(
    storage: &BlobStorage,
    action: &str,
    bill: &BillInput,
    now: DateTime<Utc>,
) -> Result<SavedBill, StorageError> {
    let saved = compact_bill(bill, now);
    let day = day_key(None, now);
    let confirmed = action == CONFIRMED;

    let key = bill_key(confirmed, &day);
    let count = append(&storage.store(BILLS), &key, &saved)?;
    info!("Saved bill to {} ({} on file)", key, count);

    if !confirmed {
        return Ok(saved);
    }

    let rollup = RollupEntry {
        ts: saved.ts.clone(),
        customer: saved.loyalty.name.clone(),
        method: saved.method.clone(),
        items: saved.items_count,
        subtotal: saved.subtotal,
        tax: saved.tax,
        total: saved.total,
        points: saved.points,
    };
    append(&storage.store(TRANSACTIONS), &rollup_key(&day), &rollup)?;

    let customer = saved.loyalty.id.as_str();
    if customer.is_empty() {
        return Ok(saved);
    }

    let loyalty = storage.store(LOYALTY);
    let points_key = format!("points:{}", customer);
    let current = loyalty
        .get_text(&points_key)?
        .and_then(|text| text.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let next = current.saturating_add(saved.points);
    loyalty.set_text(&points_key, &next.to_string())?;
    debug!("Loyalty points for {}: {} -> {}", customer, current, next);

    let history = HistoryEntry {
        ts: saved.ts.clone(),
        items: saved.items_count,
        subtotal: saved.subtotal,
        tax: saved.tax,
        total: saved.total,
        points: saved.points,
    };
    append(&loyalty, &format!("history:{}:{}.json", customer, day), &history)?;

    Ok(saved)
}

/// Confirmed bills, drafts and rollup entries recorded on `day`
pub fn list_bills(storage: &BlobStorage, day: &str) -> Result<BillsResponse, StorageError> {
    let bills = storage.store(BILLS);
    Ok(BillsResponse {
        confirmed: read_list(&bills, &bill_key(true, day))?,
        drafts: read_list(&bills, &bill_key(false, day))?,
        rollup: read_list(&storage.store(TRANSACTIONS), &rollup_key(day))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoyaltyRef;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap()
    }

    fn bill(subtotal: Value, manual_delta: Value) -> BillInput {
        BillInput {
            subtotal,
            tax: json!(1.234),
            total: json!("21.99"),
            manual_delta,
            items_count: json!(2),
            items: json!([{"sku": "pad-64", "qty": 2}]),
            method: None,
            loyalty: Some(LoyaltyRef {
                id: json!(7),
                name: "Jane Doe".to_string(),
            }),
        }
    }

    #[rstest]
    #[case(None, "2024-05-01")]
    #[case(Some(""), "2024-05-01")]
    #[case(Some("2024-02-29"), "2024-02-29")]
    #[case(Some("2024-03-01T23:30:00-05:00"), "2024-03-02")]
    #[case(Some("2024-03-01T10:00:00Z"), "2024-03-01")]
    #[case(Some("yesterday"), "2024-05-01")]
    fn test_day_key(#[case] input: Option<&str>, #[case] expected: &str) {
        assert_eq!(day_key(input, now()), expected);
    }

    #[test]
    fn test_compact_bill() {
        let saved = compact_bill(&bill(json!("20.40"), json!(5)), now());
        assert_eq!(saved.ts, "2024-05-01T15:30:00.000Z");
        assert_eq!(saved.subtotal, 20.4);
        assert_eq!(saved.tax, 1.23);
        assert_eq!(saved.total, 21.99);
        assert_eq!(saved.points, 25);
        assert_eq!(saved.method, "cash");
        assert_eq!(saved.items_count, 2);
        assert_eq!(saved.items.len(), 1);
        assert_eq!(
            saved.loyalty,
            SavedLoyalty {
                id: "7".to_string(),
                name: "Jane Doe".to_string()
            }
        );
    }

    #[test]
    fn test_compact_bill_clamps_bad_amounts() {
        let mut input = bill(json!(-12), json!("-3.9"));
        input.items = json!("not a list");
        input.loyalty = None;
        input.method = Some("card".to_string());

        let saved = compact_bill(&input, now());
        assert_eq!(saved.subtotal, 0.0);
        assert_eq!(saved.points, -3);
        assert_eq!(saved.method, "card");
        assert!(saved.items.is_empty());
        assert_eq!(saved.loyalty.id, "");
    }

    #[test]
    fn test_huge_subtotal_saturates_points() {
        let saved = compact_bill(&bill(json!(1e19), json!(5)), now());
        assert_eq!(saved.points, i64::MAX);

        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();
        storage
            .store(LOYALTY)
            .set_text("points:7", &(i64::MAX - 1).to_string())
            .unwrap();
        record_bill(&storage, CONFIRMED, &bill(json!(10), json!(0)), now()).unwrap();
        assert_eq!(
            storage.store(LOYALTY).get_text("points:7").unwrap(),
            Some(i64::MAX.to_string())
        );
    }

    #[test]
    fn test_draft_only_touches_pending() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();

        record_bill(&storage, "draft", &bill(json!(10), json!(0)), now()).unwrap();

        let listed = list_bills(&storage, "2024-05-01").unwrap();
        assert_eq!(listed.drafts.len(), 1);
        assert!(listed.confirmed.is_empty());
        assert!(listed.rollup.is_empty());
        assert_eq!(storage.store(LOYALTY).get_text("points:7").unwrap(), None);
    }

    #[test]
    fn test_confirmed_bill_updates_rollup_and_loyalty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = BlobStorage::new(dir.path()).unwrap();

        record_bill(&storage, CONFIRMED, &bill(json!(20.4), json!(5)), now()).unwrap();
        record_bill(&storage, CONFIRMED, &bill(json!(9.5), json!(0)), now()).unwrap();

        let listed = list_bills(&storage, "2024-05-01").unwrap();
        assert_eq!(listed.confirmed.len(), 2);
        assert_eq!(listed.rollup.len(), 2);
        assert_eq!(listed.rollup[0]["customer"], json!("Jane Doe"));
        assert_eq!(listed.rollup[0]["points"], json!(25));

        let loyalty = storage.store(LOYALTY);
        assert_eq!(loyalty.get_text("points:7").unwrap().as_deref(), Some("35"));
        let history: Vec<Value> = loyalty.get_json("history:7:2024-05-01.json").unwrap().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["subtotal"], json!(9.5));

        assert!(list_bills(&storage, "2024-04-30").unwrap().confirmed.is_empty());
    }
}
