use patchscan::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "PATCHSCAN_SERVER";

/// HTTP server settings. Every field is optional in the file or environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,

    /// Whole-request deadline. Startup fails unless it covers every model
    /// attempt and retry delay the analyzer may spend.
    pub timeout_secs: u64,
    /// Floor for the API body limit, which otherwise follows
    /// `intake.max_payload_bytes`.
    pub max_body_size_mb: usize,

    /// Fixed one-minute window per API key.
    pub rate_limit_per_minute: u32,

    /// Empty disables authentication.
    pub api_keys: HashSet<String>,
    pub enable_cors: bool,

    /// `EnvFilter` directive for the JSON log output.
    pub log_level: String,

    /// Pipeline YAML (`PatchscanConfig`). Defaults apply when unset.
    pub analyzer_config: Option<PathBuf>,

    /// Replaces `vision.provider` from the pipeline YAML.
    pub provider: Option<ProviderKind>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            timeout_secs: 60,
            max_body_size_mb: 10,
            rate_limit_per_minute: 60,
            api_keys: HashSet::new(),
            enable_cors: true,
            log_level: "info".into(),
            analyzer_config: None,
            provider: None,
        }
    }
}

impl ServerConfig {
    /// Read `server.{toml,yaml,json}` if present, then `PATCHSCAN_SERVER__*`.
    ///
    /// `PATCHSCAN_SERVER__API_KEYS` takes a comma-separated list.
    pub fn load() -> anyhow::Result<Self> {
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("api_keys")
            .try_parsing(true);

        let loaded: ServerConfig = config::Config::builder()
            .add_source(config::File::with_name("server").required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;

        if !loaded.auth_enabled() {
            tracing::warn!("no API keys configured; /api/v1 routes are open");
        }
        Ok(loaded)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.bind_addr, self.port).parse()?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Body limit in bytes.
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn auth_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }
}
