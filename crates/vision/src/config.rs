use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::VisionError;

pub const API_KEY_ENV: &str = "PATCHSCAN_VISION_API_KEY";
pub const API_URL_ENV: &str = "PATCHSCAN_VISION_API_URL";
pub const MODEL_ENV: &str = "PATCHSCAN_VISION_MODEL";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Which wire format the remote model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google `generateContent` with inline image data.
    #[default]
    Gemini,
    /// OpenAI-compatible `chat/completions` with an `image_url` part.
    #[serde(alias = "gpt")]
    OpenAi,
    /// Plain JSON `{model, prompt, image, schema}` to `api_url`.
    Custom,
    /// In-process canned replies; no network.
    Stub,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Custom => "custom",
            ProviderKind::Stub => "stub",
        }
    }

    fn needs_api_key(self) -> bool {
        matches!(self, ProviderKind::Gemini | ProviderKind::OpenAi)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime configuration for the vision adapter.
///
/// # Example
/// ```
/// use vision::{ProviderKind, VisionConfig};
///
/// let cfg = VisionConfig {
///     provider: ProviderKind::OpenAi,
///     model_name: "gpt-4o".into(),
///     api_key: Some("sk-test".into()),
///     ..Default::default()
/// };
/// assert!(cfg.validate().is_ok());
/// assert_eq!(cfg.endpoint().unwrap(), "https://api.openai.com/v1/chat/completions");
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisionConfig {
    pub provider: ProviderKind,
    /// Model identifier passed to the provider.
    pub model_name: String,
    /// Endpoint override; required for `custom`.
    pub api_url: Option<String>,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Upper bound on one model call, in seconds.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model_name: "gemini-1.5-pro".into(),
            api_url: None,
            api_key: None,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

// Hand-written so the key never lands in logs.
impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl VisionConfig {
    /// A config that never leaves the process.
    pub fn stub() -> Self {
        Self {
            provider: ProviderKind::Stub,
            model_name: "stub".into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Overlay `PATCHSCAN_VISION_*` environment variables.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup; blank values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = get(API_URL_ENV) {
            self.api_url = Some(url);
        }
        if let Some(model) = get(MODEL_ENV) {
            self.model_name = model;
        }
        self
    }

    /// Resolved endpoint URL for the configured provider.
    pub fn endpoint(&self) -> Result<String, VisionError> {
        if let Some(url) = self.api_url.as_deref() {
            return Ok(url.to_string());
        }
        match self.provider {
            ProviderKind::Gemini => Ok(format!(
                "{GEMINI_BASE_URL}/{}:generateContent",
                self.model_name
            )),
            ProviderKind::OpenAi => Ok(OPENAI_URL.to_string()),
            ProviderKind::Custom => Err(VisionError::InvalidConfig(
                "api_url is required for the custom provider".into(),
            )),
            ProviderKind::Stub => Err(VisionError::InvalidConfig(
                "the stub provider has no endpoint".into(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        if self.model_name.trim().is_empty() {
            return Err(VisionError::InvalidConfig("model_name must not be blank".into()));
        }
        if self.timeout_secs == 0 {
            return Err(VisionError::InvalidConfig("timeout_secs must be > 0".into()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(VisionError::InvalidConfig(
                "connect_timeout_secs must be > 0".into(),
            ));
        }
        if let Some(url) = self.api_url.as_deref() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(VisionError::InvalidConfig(format!(
                    "api_url must be an http(s) URL, got {url:?}"
                )));
            }
        }
        if self.provider == ProviderKind::Custom && self.api_url.is_none() {
            return Err(VisionError::InvalidConfig(
                "api_url is required for the custom provider".into(),
            ));
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus the credential check needed before a real call.
    pub fn validate_for_requests(&self) -> Result<(), VisionError> {
        self.validate()?;
        let has_key = self
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if self.provider.needs_api_key() && !has_key {
            return Err(VisionError::InvalidConfig(format!(
                "api_key is required for the {} provider (set {API_KEY_ENV})",
                self.provider
            )));
        }
        Ok(())
    }
}
