//! Patchscan Server - HTTP API for colorimetric patch analysis
//!
//! Exposes the analyzer and the location enhancer over JSON:
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `POST /api/v1/analyze` - Analyze one patch photo
//! - `POST /api/v1/location/enhance` - Refine a ride-request location
//!
//! Analysis responses keep their JSON shape on every outcome and map to
//! 200 (success), 400 (invalid form data) or 502 (model failure).
//! Configuration comes from an optional `server.{toml,yaml,json}` file and
//! `PATCHSCAN_SERVER__*` environment variables; the pipeline itself is
//! configured by the YAML file named in `analyzer_config`.
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
