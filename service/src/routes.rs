use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use crate::auth::{verify_bearer, verify_token};
use crate::bills::{self, day_key, record_bill};
use crate::config::ServiceConfig;
use crate::contacts::{self, add_points, find_contact, find_contact_by_id, load_contacts, set_points, ContactLookup};
use crate::models::{
    value_number, value_text, AddPointsRequest, AddPointsResponse, BillsQuery, BillsResponse, CountResponse,
    ErrorBody, InventoryResponse, LoyaltyResponse, SaveBillRequest, SaveBillResponse, TokenQuery, UpdatePointsRequest,
    UpdatePointsResponse, UpdatedPoints,
};
use crate::storage::{BlobStorage, HUB, INVENTORY};
use chrono::Utc;
use loyalty_parser::tabular::write_records;
use loyalty_parser::{normalize_contacts, normalize_inventory, ParserRegistry, RawRecord};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const INVENTORY_SOURCES: [&str; 2] = ["inventory.csv", "inventory.json"];
const HUB_KEY: &str = "all.json";

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<BlobStorage>,
    pub registry: Arc<ParserRegistry>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(storage: BlobStorage, config: ServiceConfig) -> Self {
        Self {
            storage: Arc::new(storage),
            registry: Arc::new(ParserRegistry::new()),
            config: Arc::new(config),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody::new(message)))
}

fn internal(err: impl Display) -> ApiError {
    error!("Request failed: {}", err);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/loyalty", get(get_loyalty))
        .route("/loyalty/export.csv", get(export_loyalty_csv))
        .route("/contacts", post(upload_contacts))
        .route("/points", post(update_points))
        .route("/points/add", post(add_loyalty_points))
        .route("/bills", get(list_bills).post(save_bill))
        .route("/inventory", get(get_inventory))
        .route("/hub", get(get_hub).post(save_hub))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn require_contacts(state: &AppState) -> Result<contacts::ContactDocument, ApiError> {
    load_contacts(&state.storage, &state.registry)
        .map_err(internal)?
        .ok_or_else(|| {
            warn!("No contact document in storage");
            api_error(StatusCode::NOT_FOUND, "No contacts found")
        })
}

#[instrument(skip(state))]
async fn get_loyalty(State(state): State<AppState>) -> Result<Json<LoyaltyResponse>, ApiError> {
    let document = require_contacts(&state)?;
    if document.records.is_empty() {
        warn!("{} has no rows", document.source);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{} is empty", document.source),
        ));
    }
    let data = normalize_contacts(&document.records, &state.config.aliases.contact);
    info!("Serving {} contacts from {}", data.len(), document.source);

    Ok(Json(LoyaltyResponse {
        ok: true,
        source: document.source.to_string(),
        count: data.len(),
        data,
    }))
}

#[instrument(skip(state))]
async fn export_loyalty_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let document = require_contacts(&state)?;
    let flattened: Vec<RawRecord> = normalize_contacts(&document.records, &state.config.aliases.contact)
        .iter()
        .map(|contact| contact.to_raw_record())
        .collect();
    let csv = write_records(&flattened).map_err(internal)?;
    info!("Exported {} contacts as CSV", flattened.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"contacts.csv\""),
        ],
        csv,
    )
        .into_response())
}

#[instrument(skip(state, headers, query, body), fields(bytes = body.len()))]
async fn upload_contacts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Result<Json<CountResponse>, ApiError> {
    if !verify_token(&headers, query.token.as_deref(), state.config.admin_token.as_deref()) {
        warn!("Rejected contact upload without a valid admin token");
        return Err(api_error(StatusCode::UNAUTHORIZED, "unauthorized"));
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.contains("application/json"));
    let hint = if is_json { "upload.json" } else { "upload.csv" };
    debug!("Parsing contact upload as {}", hint);

    let records = state.registry.parse_bytes(body.to_vec(), hint).map_err(|e| {
        warn!("Contact upload did not parse: {}", e);
        api_error(StatusCode::BAD_REQUEST, format!("Parse error: {}", e))
    })?;

    contacts::save_contacts(&state.storage, &records).map_err(internal)?;
    Ok(Json(CountResponse {
        ok: true,
        count: records.len(),
    }))
}

#[instrument(skip(state, payload))]
async fn update_points(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePointsRequest>, JsonRejection>,
) -> Result<Json<UpdatePointsResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!("Bad update-points body: {}", e);
        api_error(StatusCode::BAD_REQUEST, "Invalid JSON body")
    })?;

    let points = value_number(&request.points)
        .filter(|p| *p >= 0.0)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Points must be a non-negative number"))?;
    let lookup = ContactLookup {
        email: request.email,
        first: request.first_name,
        last: request.last_name,
        aka: request.aka,
    };
    if !lookup.is_usable() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Provide email OR firstName + lastName (aka optional)",
        ));
    }

    let mut document = require_contacts(&state)?;
    let table = &state.config.aliases.contact;
    let idx = find_contact(&document.records, table, &lookup)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Customer not found (check email/name/aka)"))?;

    let points = points.round() as u64;
    let record = &mut document.records[idx];
    let identifier = lookup.identifier(record, table);
    set_points(record, table, points);
    contacts::save_contacts(&state.storage, &document.records).map_err(internal)?;
    info!("Set points for {} to {}", identifier, points);

    Ok(Json(UpdatePointsResponse {
        ok: true,
        updated: UpdatedPoints { identifier, points },
    }))
}

#[instrument(skip(state, payload))]
async fn add_loyalty_points(
    State(state): State<AppState>,
    payload: Result<Json<AddPointsRequest>, JsonRejection>,
) -> Result<Json<AddPointsResponse>, ApiError> {
    let missing = || api_error(StatusCode::BAD_REQUEST, "Missing id or delta");
    let Json(request) = payload.map_err(|e| {
        warn!("Bad add-points body: {}", e);
        missing()
    })?;
    let id = value_text(&request.id);
    if id.is_empty() {
        return Err(missing());
    }
    let added = request.delta.round() as i64;

    let not_found = || api_error(StatusCode::NOT_FOUND, "Contact not found");
    let mut document = load_contacts(&state.storage, &state.registry)
        .map_err(internal)?
        .ok_or_else(not_found)?;
    let table = &state.config.aliases.contact;
    let idx = find_contact_by_id(&document.records, table, &id).ok_or_else(not_found)?;

    let total = add_points(&mut document.records[idx], table, added);
    contacts::save_contacts(&state.storage, &document.records).map_err(internal)?;
    info!("Added {} points to contact {}, total {}", added, id, total);

    Ok(Json(AddPointsResponse {
        ok: true,
        id,
        added,
        total,
    }))
}

#[instrument(skip(state, payload))]
async fn save_bill(
    State(state): State<AppState>,
    payload: Result<Json<SaveBillRequest>, JsonRejection>,
) -> Result<Json<SaveBillResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!("Bad save-bill body: {}", e);
        api_error(StatusCode::BAD_REQUEST, "Missing action or bill")
    })?;
    if request.action.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing action or bill"));
    }

    let saved = record_bill(&state.storage, request.action.trim(), &request.bill, Utc::now()).map_err(internal)?;
    Ok(Json(SaveBillResponse { ok: true, saved }))
}

#[instrument(skip(state))]
async fn list_bills(
    State(state): State<AppState>,
    Query(query): Query<BillsQuery>,
) -> Result<Json<BillsResponse>, ApiError> {
    let day = day_key(query.day.as_deref(), Utc::now());
    let listed = bills::list_bills(&state.storage, &day).map_err(internal)?;
    debug!(
        "Bills for {}: {} confirmed, {} drafts",
        day,
        listed.confirmed.len(),
        listed.drafts.len()
    );
    Ok(Json(listed))
}

#[instrument(skip(state))]
async fn get_inventory(State(state): State<AppState>) -> Result<Json<InventoryResponse>, ApiError> {
    let store = state.storage.store(INVENTORY);

    for key in INVENTORY_SOURCES {
        let Some(bytes) = store.get_bytes(key).map_err(internal)? else {
            continue;
        };
        let records = state.registry.parse_bytes(bytes, key).map_err(internal)?;
        let items = normalize_inventory(&records, &state.config.aliases.inventory);
        if items.is_empty() {
            warn!("{} holds no inventory items", key);
            continue;
        }
        info!("Serving {} inventory items from {}", items.len(), key);
        return Ok(Json(InventoryResponse {
            ok: true,
            source: key.to_string(),
            items,
        }));
    }

    Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "No inventory found"))
}

async fn get_hub(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .storage
        .store(HUB)
        .get_text(HUB_KEY)
        .map_err(internal)?
        .unwrap_or_else(|| "[]".to_string());
    Ok(([(header::CONTENT_TYPE, "application/json; charset=utf-8")], body).into_response())
}

#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
async fn save_hub(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CountResponse>, ApiError> {
    if !verify_bearer(&headers, state.config.admin_token.as_deref()) {
        warn!("Rejected hub upload without a valid bearer token");
        return Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }

    let entries = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => return Err(api_error(StatusCode::BAD_REQUEST, "Expected a JSON array")),
        Err(e) => return Err(api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))),
    };

    state.storage.store(HUB).set_json(HUB_KEY, &entries).map_err(internal)?;
    info!("Saved {} hub entries", entries.len());
    Ok(Json(CountResponse {
        ok: true,
        count: entries.len(),
    }))
}
