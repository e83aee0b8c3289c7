use crate::error::ServerError;
use crate::state::ServerState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Request ID carried in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// `x-api-key`, else `Authorization` with an optional `Bearer ` prefix.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(API_KEY_HEADER)
        .or_else(|| headers.get(AUTHORIZATION))?
        .to_str()
        .ok()?;
    Some(raw.strip_prefix("Bearer ").unwrap_or(raw).trim())
}

/// Key check plus per-key rate limit. Open when no keys are configured.
pub async fn api_key_auth(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if state.config.auth_enabled() {
        let key = presented_key(request.headers()).ok_or_else(|| {
            ServerError::Authentication(
                "API key required in 'X-API-Key' or 'Authorization: Bearer <key>'".into(),
            )
        })?;
        if !state.is_valid_api_key(key) {
            return Err(ServerError::Authentication("Invalid API key".into()));
        }
        if !state.check_rate_limit(key) {
            return Err(ServerError::RateLimitExceeded);
        }
    }
    Ok(next.run(request).await)
}

/// Reuse the caller's `x-request-id` or mint a v4 UUID; echo it back.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = match request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => uuid::Uuid::new_v4().to_string(),
    };
    let header = HeaderValue::from_str(&id).ok();
    request.extensions_mut().insert(RequestId(id));

    let mut response = next.run(request).await;
    if let Some(header) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
    response
}

/// One span per request; a single completion event with status and latency.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request_completed"
        )
    });
    response
}
