use crate::error::ServerResult;
use crate::routes::bad_body;
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use patchscan::{AnalyzeRequest, AnalyzeResponse, IMAGE_FIELD};
use std::sync::Arc;

/// Analyze one patch photo.
///
/// `POST /api/v1/analyze` with `{"imageDataUri": "data:image/...;base64,..."}`.
/// The body is always one of the three analysis shapes:
///
/// | Outcome | Status |
/// |---------|--------|
/// | success | 200 |
/// | invalid form data | 400 |
/// | model failure | 502 |
///
/// A body over the route's limit is reported as an oversized image.
pub async fn analyze_patch(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let response = match payload {
        Ok(Json(request)) => state.analyzer.respond(&request).await,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            oversized(&state)
        }
        Err(rejection) => return Err(bad_body(rejection)),
    };
    Ok((status_for(&response), Json(response)))
}

fn oversized(state: &ServerState) -> AnalyzeResponse {
    let message = match state.analyzer.config().intake.max_payload_bytes {
        Some(limit) => format!("Image is too large (limit {limit} bytes)."),
        None => format!(
            "Image is too large (request body limit {} bytes).",
            state.body_limit()
        ),
    };
    AnalyzeResponse::invalid(IMAGE_FIELD, message)
}

pub(crate) fn status_for(response: &AnalyzeResponse) -> StatusCode {
    match response {
        AnalyzeResponse::Success { .. } => StatusCode::OK,
        AnalyzeResponse::Invalid { .. } => StatusCode::BAD_REQUEST,
        AnalyzeResponse::Failed { .. } => StatusCode::BAD_GATEWAY,
    }
}
