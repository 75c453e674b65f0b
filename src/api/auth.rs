//! Authentication middleware and caller identity for the REST API
//!
//! API key authentication is optional: when `ApiConfig::api_key` is set,
//! every request must carry a matching `X-Api-Key` header or it receives a
//! 401. Caller identity for manifest attribution comes from the `X-User-Id`
//! header and falls back to `anonymous`.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Header carrying the requesting user's identity, recorded in manifests
pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that checks the `X-Api-Key` header against the configured key.
///
/// When no key is configured all requests pass through.
pub async fn require_api_key(
    State(expected_api_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_key) = expected_api_key else {
        return next.run(request).await;
    };

    let api_key_header = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    // Constant-time comparison to prevent timing side channels
    match api_key_header {
        Some(provided_key)
            if constant_time_eq(provided_key.as_bytes(), expected_key.as_bytes()) =>
        {
            next.run(request).await
        }
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing X-Api-Key header"),
    }
}

/// Resolve the requesting user's identity from the request headers
pub fn user_identity(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Always compares all bytes regardless of where the first mismatch occurs
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized_response(message: &str) -> Response {
    let body = Json(json!({
        "error": {
            "code": "unauthorized",
            "message": message
        }
    }));

    (StatusCode::UNAUTHORIZED, body).into_response()
}
