//! Configuration types for image intake.
//!
//! [`IntakeConfig`] controls which images are accepted and how strictly the
//! embedded payload is checked. It is cheap to clone and deserializes from
//! JSON, TOML, or YAML.
//!
//! ```rust
//! use intake::IntakeConfig;
//!
//! let config = IntakeConfig::default();
//! config.validate().expect("default intake config is valid");
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default ceiling for a decoded patch photo (10 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Runtime configuration for intake behavior.
///
/// ```json
/// {
///   "version": 1,
///   "allowed_mime_prefixes": ["image/"],
///   "max_payload_bytes": 10485760,
///   "verify_payload": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Version of the intake configuration.
    pub version: u32,

    /// MIME type prefixes accepted in the data URI header, matched
    /// case-insensitively. `"image/"` accepts every image type; an exact type
    /// such as `"image/jpeg"` restricts to that type.
    pub allowed_mime_prefixes: Vec<String>,

    /// Maximum decoded payload size in bytes. `None` disables the check.
    pub max_payload_bytes: Option<usize>,

    /// Decode the base64 payload to prove it is well-formed and to measure
    /// its size. When `false` the decoded size is estimated from the encoded
    /// length.
    pub verify_payload: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            allowed_mime_prefixes: vec!["image/".to_string()],
            max_payload_bytes: Some(DEFAULT_MAX_PAYLOAD_BYTES),
            verify_payload: true,
        }
    }
}

impl IntakeConfig {
    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::InvalidVersion);
        }
        if self.allowed_mime_prefixes.is_empty() {
            return Err(ConfigError::EmptyMimeAllowList);
        }
        if let Some(prefix) = self
            .allowed_mime_prefixes
            .iter()
            .find(|prefix| prefix.trim().is_empty())
        {
            return Err(ConfigError::BlankMimePrefix(prefix.clone()));
        }
        if self.max_payload_bytes == Some(0) {
            return Err(ConfigError::ZeroPayloadLimit);
        }
        Ok(())
    }

    /// Whether `mime_type` matches one of the allowed prefixes.
    pub fn allows_mime(&self, mime_type: &str) -> bool {
        let mime = mime_type.to_ascii_lowercase();
        self.allowed_mime_prefixes
            .iter()
            .any(|prefix| mime.starts_with(&prefix.to_ascii_lowercase()))
    }
}

/// Errors reported by [`IntakeConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("intake.version must be >= 1")]
    InvalidVersion,

    /// No image would ever be accepted.
    #[error("intake.allowed_mime_prefixes must not be empty")]
    EmptyMimeAllowList,

    #[error("intake.allowed_mime_prefixes contains a blank entry: {0:?}")]
    BlankMimePrefix(String),

    #[error("intake.max_payload_bytes must be greater than zero")]
    ZeroPayloadLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = IntakeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_payload_bytes, Some(DEFAULT_MAX_PAYLOAD_BYTES));
        assert!(cfg.verify_payload);
    }

    #[test]
    fn empty_allow_list_is_rejected() {
        let cfg = IntakeConfig {
            allowed_mime_prefixes: vec![],
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyMimeAllowList));
    }

    #[test]
    fn blank_prefix_is_rejected() {
        let cfg = IntakeConfig {
            allowed_mime_prefixes: vec!["image/".into(), "  ".into()],
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BlankMimePrefix(_))
        ));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let cfg = IntakeConfig {
            max_payload_bytes: Some(0),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPayloadLimit));
    }

    #[test]
    fn allows_mime_is_case_insensitive() {
        let cfg = IntakeConfig {
            allowed_mime_prefixes: vec!["image/jpeg".into()],
            ..Default::default()
        };
        assert!(cfg.allows_mime("IMAGE/JPEG"));
        assert!(!cfg.allows_mime("image/png"));
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let cfg: IntakeConfig = serde_json::from_str(r#"{"verify_payload": false}"#).unwrap();
        assert!(!cfg.verify_payload);
        assert_eq!(cfg.allowed_mime_prefixes, vec!["image/".to_string()]);
    }
}
