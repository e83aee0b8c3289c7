//! YAML configuration for the patch-analysis pipeline.
//!
//! One document configures every stage: intake limits, the vision provider,
//! the derivation policy and the optional retry policy. Every section is
//! optional and falls back to its defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "clinic-kiosk"
//!
//! intake:
//!   allowed_mime_prefixes: ["image/jpeg", "image/png"]
//!   max_payload_bytes: 5242880
//!
//! vision:
//!   provider: gemini
//!   model_name: gemini-1.5-pro
//!   timeout_secs: 30
//!
//! derivation:
//!   thresholds:
//!     monitor_at: 1
//!     urgent_at: 2
//!
//! retry:
//!   max_retries: 2
//!   base_delay: 250
//!   max_delay: 2000
//! ```
//!
//! `vision.api_key` may be set in the file but is never serialized back out;
//! prefer `PATCHSCAN_VISION_API_KEY` via [`PatchscanConfig::with_env_overrides`].

use std::fs;
use std::path::Path;

use indicator::DerivationPolicy;
use intake::IntakeConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vision::{RetryConfig, VisionConfig};

use crate::analyzer::AnalyzerConfig;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PatchscanConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub intake: IntakeConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub derivation: DerivationPolicy,

    /// Absent means no retries.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl PatchscanConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PatchscanConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.intake
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("intake: {e}")))?;
        self.vision
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("vision: {e}")))?;
        self.derivation
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("derivation: {e}")))?;
        if let Some(retry) = &self.retry {
            retry
                .validate()
                .map_err(|e| ConfigLoadError::Validation(format!("retry: {e}")))?;
        }
        Ok(())
    }

    /// Overlay `PATCHSCAN_VISION_*` environment variables onto the vision section.
    pub fn with_env_overrides(mut self) -> Self {
        self.vision = self.vision.with_env_overrides();
        self
    }

    pub fn into_analyzer_config(self) -> AnalyzerConfig {
        AnalyzerConfig {
            intake: self.intake,
            vision: self.vision,
            policy: self.derivation,
            retry: self.retry,
        }
    }
}

impl Default for PatchscanConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            intake: IntakeConfig::default(),
            vision: VisionConfig::default(),
            derivation: DerivationPolicy::default(),
            retry: None,
        }
    }
}
