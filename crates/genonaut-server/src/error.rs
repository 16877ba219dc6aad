//! Error handling for the axum server.
//! Maps `GenonautError` to the `{error:{kind, message}}` envelope and the
//! HTTP status table from §7.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use genonaut_core::error::GenonautError;
use serde_json::json;

/// Wrapper to convert `GenonautError` into an axum response.
pub struct AppError(GenonautError);

impl From<GenonautError> for AppError {
    fn from(e: GenonautError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
