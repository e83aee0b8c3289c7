//! API route handlers
//!
//! - `health`: liveness and readiness probes
//! - `analyze`: patch analysis
//! - `location`: volunteer location refinement

pub mod analyze;
pub mod health;
pub mod location;

use crate::error::{ServerError, ServerResult};
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info (GET /, no authentication).
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Patchscan Server",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/api/v1/analyze",
            "/api/v1/location/enhance",
            "/health",
            "/ready"
        ]
    })))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// Unparseable bodies never reach the pipeline.
pub(crate) fn bad_body(rejection: JsonRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}
