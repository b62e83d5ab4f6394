use axum::http::{header::AUTHORIZATION, HeaderMap};
use subtle::ConstantTimeEq;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Token supplied by the caller: `Authorization: Bearer`, then
/// `X-Admin-Token`, then the `?token=` query parameter.
pub fn provided_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let header = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    [bearer, header, query_token.map(str::trim)]
        .into_iter()
        .flatten()
        .find(|t| !t.is_empty())
}

/// True only when an admin token is configured and the caller sent it
pub fn verify_token(headers: &HeaderMap, query_token: Option<&str>, expected: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|e| !e.is_empty()) else {
        return false;
    };
    match provided_token(headers, query_token) {
        Some(provided) => provided.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

/// Bearer-only check used by the hub upload
pub fn verify_bearer(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|e| !e.is_empty()) else {
        return false;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false)
}
