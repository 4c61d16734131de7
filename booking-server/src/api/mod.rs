//! API module
//!
//! HTTP surface of the booking ledger for the hotel mini-app and its admin panel.

mod error;

pub use error::ApiError;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use storefront_core::model::BookingRequest;
use storefront_core::telegram::{CallbackDispatcher, CallbackOutcome, Update};
use storefront_core::{BookingLedger, OrderFilter};
use tower_http::cors::CorsLayer;

pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";
pub const ADMIN_KEY_HEADER: &str = "x-hotel-admin-key";

// App State to share with routes
#[derive(Clone)]
pub struct AppState {
    pub ledger: BookingLedger,
    pub dispatcher: Arc<CallbackDispatcher>,
    pub admin_key: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/hotel/book", post(submit_booking))
        .route("/api/hotel/orders", get(list_orders))
        .route("/api/hotel/orders/:id/status", patch(set_order_status))
        .route("/api/hotel/telegram/webhook", post(telegram_webhook))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness payload polled by the health monitor.
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "booking-server" }))
}

async fn submit_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!("API: Rejected booking body: {}", e);
        ApiError::BadRequest("invalid_json".into())
    })?;

    let header_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok());
    let key = request.idempotency_key(header_key);

    let receipt = state.ledger.submit_booking(request, &key).await?;
    Ok(Json(json!({
        "ok": true,
        "duplicated": receipt.duplicated,
        "orderId": receipt.order_id,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    q: Option<String>,
    limit: Option<String>,
    key: Option<String>,
}

async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state.admin_key, &headers, query.key.as_deref(), None)?;

    let filter = OrderFilter::from_query(
        query.status.as_deref(),
        query.q.as_deref(),
        query.limit.as_deref(),
    );
    let list = state.ledger.list_orders(&filter).await?;
    Ok(Json(json!({ "ok": true, "list": list })))
}

#[derive(Debug, Default, Deserialize)]
struct AdminQuery {
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    admin_key: Option<String>,
}

async fn set_order_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<AdminQuery>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.unwrap_or_default();
    authorize(
        &state.admin_key,
        &headers,
        query.key.as_deref(),
        body.admin_key.as_deref(),
    )?;

    let status = body.status.unwrap_or_default();
    let change = state.ledger.set_order_status(&id, &status).await?;
    Ok(Json(json!({
        "ok": true,
        "order": change.order,
        "duplicated": change.duplicated,
    })))
}

/// Telegram always gets 200 so it does not redeliver the update.
async fn telegram_webhook(
    State(state): State<AppState>,
    payload: Result<Json<Update>, JsonRejection>,
) -> impl IntoResponse {
    let update = match payload {
        Ok(Json(update)) => update,
        Err(e) => {
            warn!("API: Unreadable Telegram update: {}", e);
            return Json(json!({ "ok": true, "ignored": true }));
        }
    };

    match state.dispatcher.handle_update(update).await {
        CallbackOutcome::Ignored => Json(json!({ "ok": true, "ignored": true })),
        CallbackOutcome::Applied(change) => {
            info!("API: Telegram decision applied to {}", change.order.id);
            Json(json!({ "ok": true, "duplicated": change.duplicated }))
        }
        CallbackOutcome::Failed(e) => Json(json!({ "ok": false, "error": e.code() })),
    }
}

/// Admin gate. An empty configured key means dev mode: everything passes.
///
/// The key is looked up in the header first, then `?key=`, then the body's `adminKey`.
fn authorize(
    expected: &str,
    headers: &HeaderMap,
    query_key: Option<&str>,
    body_key: Option<&str>,
) -> Result<(), ApiError> {
    if expected.is_empty() {
        return Ok(());
    }
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| query_key.map(str::trim).filter(|k| !k.is_empty()))
        .or_else(|| body_key.map(str::trim).filter(|k| !k.is_empty()));

    match presented {
        Some(key) if key == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_authorize_sources() {
        let mut headers = HeaderMap::new();
        assert!(authorize("", &headers, None, None).is_ok());
        assert!(authorize("secret", &headers, None, None).is_err());
        assert!(authorize("secret", &headers, Some("secret"), None).is_ok());
        assert!(authorize("secret", &headers, None, Some(" secret ")).is_ok());
        assert!(authorize("secret", &headers, Some("wrong"), Some("secret")).is_err());

        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(authorize("secret", &headers, Some("wrong"), None).is_ok());
    }
}
