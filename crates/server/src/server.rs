//! Router assembly, startup and graceful shutdown.

use crate::config::ServerConfig;
use crate::middleware::{api_key_auth, log_requests, request_id};
use crate::routes::{analyze, api_info, health, location, not_found};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

fn cors(config: &ServerConfig) -> CorsLayer {
    if !config.enable_cors {
        return CorsLayer::new();
    }
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// `/api/v1` routes: body limit sized for the largest accepted image, then
/// auth and rate limiting.
fn api_routes(state: &Arc<ServerState>) -> Router<Arc<ServerState>> {
    Router::new()
        .route("/api/v1/analyze", post(analyze::analyze_patch))
        .route("/api/v1/location/enhance", post(location::enhance_location))
        .layer(DefaultBodyLimit::max(state.body_limit()))
        .layer(from_fn_with_state(Arc::clone(state), api_key_auth))
}

/// The full application. Probes and `/` are public.
///
/// Request id is the outermost layer so every log line below it can carry
/// the id; the timeout is the innermost global layer.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let probes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check));

    Router::new()
        .merge(probes)
        .merge(api_routes(&state))
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .with_state(state)
}

/// Install JSON logging, build the analyzer, then serve until Ctrl+C or
/// SIGTERM.
///
/// ```rust,no_run
/// # async fn run() -> anyhow::Result<()> {
/// server::start_server(server::ServerConfig::load()?).await
/// # }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.as_str())
        .with_target(false)
        .with_thread_ids(true)
        .json()
        .init();

    let addr = config.socket_addr()?;
    let state = Arc::new(ServerState::new(config)?);

    let analyzer_cfg = state.analyzer.config();
    tracing::info!(
        %addr,
        provider = analyzer_cfg.vision.provider.as_str(),
        model = %analyzer_cfg.vision.model_name,
        retry = analyzer_cfg.retry.is_some(),
        auth = state.config.auth_enabled(),
        rate_limit_per_minute = state.config.rate_limit_per_minute,
        timeout_secs = state.config.timeout_secs,
        body_limit_bytes = state.body_limit(),
        "server_starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server_stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that fails to install never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "ctrl_c", "shutdown_requested"),
        _ = terminate => tracing::info!(signal = "sigterm", "shutdown_requested"),
    }
}
