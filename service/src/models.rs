use loyalty_parser::{CanonicalContact, CanonicalInventoryItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyResponse {
    pub ok: bool,
    pub source: String,
    pub count: usize,
    pub data: Vec<CanonicalContact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryResponse {
    pub ok: bool,
    pub source: String,
    pub items: Vec<CanonicalInventoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePointsRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub aka: Option<String>,
    /// Number or numeric string
    #[serde(default)]
    pub points: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedPoints {
    pub identifier: String,
    pub points: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePointsResponse {
    pub ok: bool,
    pub updated: UpdatedPoints,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddPointsRequest {
    /// String or number
    #[serde(default)]
    pub id: Value,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddPointsResponse {
    pub ok: bool,
    pub id: String,
    pub added: i64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoyaltyRef {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: String,
}

/// Bill as posted by the register; amounts may arrive as numbers or strings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillInput {
    #[serde(default)]
    pub subtotal: Value,
    #[serde(default)]
    pub tax: Value,
    #[serde(default)]
    pub total: Value,
    #[serde(default)]
    pub manual_delta: Value,
    #[serde(default)]
    pub items_count: Value,
    #[serde(default)]
    pub items: Value,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub loyalty: Option<LoyaltyRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveBillRequest {
    pub action: String,
    pub bill: BillInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLoyalty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedBill {
    pub ts: String,
    pub items_count: i64,
    pub items: Vec<Value>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub method: String,
    pub loyalty: SavedLoyalty,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupEntry {
    pub ts: String,
    pub customer: String,
    pub method: String,
    pub items: i64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: String,
    pub items: i64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveBillResponse {
    pub ok: bool,
    pub saved: SavedBill,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillsQuery {
    #[serde(default)]
    pub day: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillsResponse {
    pub confirmed: Vec<Value>,
    pub drafts: Vec<Value>,
    pub rollup: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Text of a loosely typed JSON scalar: strings as-is, numbers via JSON text
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Number from a loosely typed JSON scalar; anything else is `None`
pub fn value_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_helpers() {
        assert_eq!(value_text(&json!(" 12 ")), "12");
        assert_eq!(value_text(&json!(12)), "12");
        assert_eq!(value_text(&json!(null)), "");
        assert_eq!(value_number(&json!("4.5")), Some(4.5));
        assert_eq!(value_number(&json!(3)), Some(3.0));
        assert_eq!(value_number(&json!("x")), None);
        assert_eq!(value_number(&json!(true)), None);
    }

    #[test]
    fn test_bill_input_accepts_camel_case_and_strings() {
        let bill: BillInput = serde_json::from_value(json!({
            "subtotal": "20.40",
            "manualDelta": 5,
            "itemsCount": 2,
            "loyalty": {"id": 7, "name": "Jane Doe"}
        }))
        .unwrap();
        assert_eq!(value_number(&bill.subtotal), Some(20.4));
        assert_eq!(value_number(&bill.manual_delta), Some(5.0));
        assert_eq!(bill.loyalty.unwrap().id, json!(7));
        assert_eq!(bill.method, None);
    }
}
