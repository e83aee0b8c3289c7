use crate::error::ServerResult;
use crate::routes::bad_body;
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use patchscan::{EnhanceLocationRequest, EnhanceLocationResponse};
use std::sync::Arc;

/// Refine a ride-request location from volunteer feedback.
///
/// `POST /api/v1/location/enhance`; same status mapping as analysis.
pub async fn enhance_location(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<EnhanceLocationRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload.map_err(bad_body)?;
    let response = state.location.respond(&request).await;
    let status = match &response {
        EnhanceLocationResponse::Success { .. } => StatusCode::OK,
        EnhanceLocationResponse::Invalid { .. } => StatusCode::BAD_REQUEST,
        EnhanceLocationResponse::Failed { .. } => StatusCode::BAD_GATEWAY,
    };
    Ok((status, Json(response)))
}
