use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use dashmap::DashMap;
use patchscan::{Analyzer, LocationEnhancer, PatchscanConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Room for the JSON envelope and the `data:` header around the base64 image.
const ENVELOPE_ALLOWANCE: usize = 64 * 1024;

/// Time the request deadline must leave beyond the analyzer's own bound.
const DEADLINE_HEADROOM: Duration = Duration::from_secs(1);

/// Requests counted in the current fixed window of one API key.
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    pub started: Instant,
    pub count: u32,
}

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub analyzer: Arc<Analyzer>,
    /// Uses the analyzer's model.
    pub location: LocationEnhancer,
    pub rate_limiter: Arc<DashMap<String, RateWindow>>,
}

impl ServerState {
    /// Build the analyzer from `config.analyzer_config` (or defaults),
    /// `PATCHSCAN_VISION_*` variables and `config.provider`, in that order.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let mut pipeline = match &config.analyzer_config {
            Some(path) => PatchscanConfig::from_file(path)?,
            None => PatchscanConfig::default(),
        }
        .with_env_overrides();
        if let Some(provider) = config.provider {
            pipeline.vision.provider = provider;
        }

        let analyzer = Analyzer::from_config(pipeline.into_analyzer_config())
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Self::with_analyzer(config, analyzer)
    }

    /// Fails when `timeout_secs` could cut off an analysis that is still
    /// inside its model deadline and retry budget.
    pub fn with_analyzer(config: ServerConfig, analyzer: Analyzer) -> ServerResult<Self> {
        let needed = analyzer
            .config()
            .worst_case_duration()
            .saturating_add(DEADLINE_HEADROOM);
        if config.timeout() < needed {
            return Err(ServerError::Config(format!(
                "timeout_secs ({}s) must be at least {}s: vision.timeout_secs times \
                 (retry.max_retries + 1) plus retry delays, plus {}s",
                config.timeout_secs,
                needed.as_secs_f64().ceil(),
                DEADLINE_HEADROOM.as_secs(),
            )));
        }

        Ok(Self {
            config: Arc::new(config),
            location: analyzer.location_enhancer(),
            analyzer: Arc::new(analyzer),
            rate_limiter: Arc::new(DashMap::new()),
        })
    }

    /// Request body limit for the API routes: the base64 form of the largest
    /// image intake accepts plus [`ENVELOPE_ALLOWANCE`], never below
    /// `max_body_size_mb`.
    pub fn body_limit(&self) -> usize {
        let configured = self.config.max_body_size();
        match self.analyzer.config().intake.max_payload_bytes {
            Some(decoded) => configured.max(
                decoded
                    .div_ceil(3)
                    .saturating_mul(4)
                    .saturating_add(ENVELOPE_ALLOWANCE),
            ),
            None => configured,
        }
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.api_keys.contains(key)
    }

    /// Count one request against `key`; `false` once the window is full.
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut window = self
            .rate_limiter
            .entry(key.to_owned())
            .or_insert(RateWindow { started: now, count: 0 });

        if now.duration_since(window.started) > RATE_WINDOW {
            *window = RateWindow { started: now, count: 0 };
        }
        if window.count >= self.config.rate_limit_per_minute {
            return false;
        }
        window.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchscan::{AnalyzerConfig, IntakeConfig, RetryConfig, StubModel, VisionConfig};

    fn state(limit: u32) -> ServerState {
        let config = ServerConfig {
            rate_limit_per_minute: limit,
            api_keys: ["k1".to_string()].into_iter().collect(),
            ..ServerConfig::default()
        };
        let analyzer =
            Analyzer::new(Arc::new(StubModel::normal()), AnalyzerConfig::default()).unwrap();
        ServerState::with_analyzer(config, analyzer).unwrap()
    }

    #[test]
    fn rate_limit_is_per_key() {
        let state = state(2);
        assert!(state.check_rate_limit("k1"));
        assert!(state.check_rate_limit("k1"));
        assert!(!state.check_rate_limit("k1"));
        assert!(state.check_rate_limit("k2"));
    }

    #[test]
    fn api_key_lookup() {
        let state = state(10);
        assert!(state.is_valid_api_key("k1"));
        assert!(!state.is_valid_api_key("k2"));
    }

    #[test]
    fn stub_provider_builds_without_credentials() {
        let config = ServerConfig {
            provider: Some(patchscan::ProviderKind::Stub),
            ..ServerConfig::default()
        };
        let state = ServerState::new(config).unwrap();
        assert_eq!(state.analyzer.model().label(), "stub");
    }

    #[test]
    fn missing_analyzer_config_file_is_an_error() {
        let config = ServerConfig {
            analyzer_config: Some("/nonexistent/patchscan.yaml".into()),
            ..ServerConfig::default()
        };
        assert!(matches!(
            ServerState::new(config),
            Err(ServerError::ConfigLoad(_))
        ));
    }

    #[test]
    fn body_limit_fits_largest_accepted_image() {
        let state = state(10);
        let intake_limit = IntakeConfig::default().max_payload_bytes.unwrap();
        assert!(state.body_limit() >= intake_limit / 3 * 4 + ENVELOPE_ALLOWANCE);
        assert!(state.body_limit() > state.config.max_body_size());
    }

    #[test]
    fn body_limit_keeps_larger_configured_size() {
        let config = ServerConfig {
            max_body_size_mb: 64,
            ..ServerConfig::default()
        };
        let analyzer =
            Analyzer::new(Arc::new(StubModel::normal()), AnalyzerConfig::default()).unwrap();
        let state = ServerState::with_analyzer(config, analyzer).unwrap();
        assert_eq!(state.body_limit(), 64 * 1024 * 1024);
    }

    #[test]
    fn request_timeout_must_cover_retry_budget() {
        let cfg = AnalyzerConfig {
            vision: VisionConfig::stub(),
            retry: Some(RetryConfig::default()),
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::new(Arc::new(StubModel::normal()), cfg).unwrap();

        let err = ServerState::with_analyzer(ServerConfig::default(), analyzer.clone())
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::Config(ref msg) if msg.contains("timeout_secs")));

        let config = ServerConfig {
            timeout_secs: 120,
            ..ServerConfig::default()
        };
        assert!(ServerState::with_analyzer(config, analyzer).is_ok());
    }

    #[test]
    fn default_request_timeout_covers_single_attempt() {
        let analyzer =
            Analyzer::new(Arc::new(StubModel::normal()), AnalyzerConfig::default()).unwrap();
        assert!(ServerState::with_analyzer(ServerConfig::default(), analyzer).is_ok());
    }
}
