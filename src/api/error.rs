use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::LedgerError;

pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            LedgerError::ValidationError(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            LedgerError::InsufficientBalance { .. } => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            LedgerError::WalletNotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            LedgerError::DuplicateKeyRace(_) => (StatusCode::OK, self.0.to_string()),
            LedgerError::ConflictInFlight => (StatusCode::CONFLICT, self.0.to_string()),
            LedgerError::TerminallyFailed(_) => (StatusCode::CONFLICT, self.0.to_string()),
            LedgerError::LedgerImmutable => {
                tracing::error!("attempted mutation of an immutable ledger entry");
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
            LedgerError::StorageError(ref e) => {
                tracing::error!(error = %e, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}
