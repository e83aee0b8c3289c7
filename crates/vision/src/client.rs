use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::{ProviderKind, VisionConfig};
use crate::error::VisionError;
use crate::model::{GenerativeModel, ModelRequest};
use crate::provider::{build_payload, extract_reply};

/// Bodies longer than this are cut before they land in an error.
const MAX_ERROR_BODY: usize = 512;

/// A remote model reached over HTTPS.
///
/// Holds its own connection-pooled client; clone-free sharing goes through
/// `Arc<dyn GenerativeModel>`.
#[derive(Debug)]
pub struct HttpModel {
    client: reqwest::Client,
    cfg: VisionConfig,
    endpoint: String,
}

impl HttpModel {
    pub fn new(cfg: VisionConfig) -> Result<Self, VisionError> {
        if cfg.provider == ProviderKind::Stub {
            return Err(VisionError::InvalidConfig(
                "HttpModel cannot serve the stub provider".into(),
            ));
        }
        cfg.validate_for_requests()?;
        let endpoint = cfg.endpoint()?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(cfg.connect_timeout())
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| VisionError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            cfg,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let Some(key) = self.cfg.api_key.as_deref() else {
            return request;
        };
        match self.cfg.provider {
            ProviderKind::Gemini => request.header("x-goog-api-key", key),
            _ => request.bearer_auth(key),
        }
    }

    async fn send(&self, payload: Value) -> Result<Value, VisionError> {
        let request = self.authorize(self.client.post(&self.endpoint)).json(&payload);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(VisionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| VisionError::InvalidResponse(format!("provider sent invalid JSON: {e}")))
    }
}

#[async_trait]
impl GenerativeModel for HttpModel {
    fn label(&self) -> String {
        format!("{}/{}", self.cfg.provider, self.cfg.model_name)
    }

    async fn generate(&self, request: ModelRequest) -> Result<Value, VisionError> {
        let payload = build_payload(self.cfg.provider, &self.cfg.model_name, &request)?;
        debug!(
            provider = %self.cfg.provider,
            model = %self.cfg.model_name,
            task = request.task.as_str(),
            "model_request"
        );
        let response = self.send(payload).await?;
        extract_reply(self.cfg.provider, response)
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
