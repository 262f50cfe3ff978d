//! Error responses for the HTTP handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = if self.is_upstream_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        tracing::error!(
            category = %self.category(),
            error = %self,
            status = status.as_u16(),
            "Request failed"
        );

        // Key material details stay in the logs.
        let body = json!({
            "error": "server_error",
            "error_description": status.canonical_reason().unwrap_or("Server error"),
        });

        (status, Json(body)).into_response()
    }
}
