use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;
use storefront_core::{LedgerError, StoreError};

/// Every failure the HTTP layer can answer with.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    Unauthorized,
    BadRequest(String),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Ledger(LedgerError::Store(StoreError::LockTimeout { .. })) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Ledger(LedgerError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> String {
        match self {
            ApiError::Unauthorized => "hotel_admin_unauthorized".to_string(),
            ApiError::BadRequest(code) => code.clone(),
            ApiError::Ledger(e) => e.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("API: {} -> {:?}", status, self);
        }

        let body = Json(json!({ "ok": false, "error": self.code() }));
        if status == StatusCode::SERVICE_UNAVAILABLE {
            // Lock contention: the client may retry, submissions are idempotent.
            return (status, [(header::RETRY_AFTER, "1")], body).into_response();
        }
        (status, body).into_response()
    }
}
