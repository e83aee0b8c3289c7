use async_trait::async_trait;
use intake::PatchImage;
use serde_json::Value;

use crate::error::VisionError;

/// What a request is for; lets stubs and logs tell the two calls apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    ReadIndicators,
    EnhanceLocation,
}

impl ModelTask {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTask::ReadIndicators => "read_indicators",
            ModelTask::EnhanceLocation => "enhance_location",
        }
    }
}

/// One self-contained model call: instructions, an optional image, and the
/// JSON schema the reply must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub task: ModelTask,
    pub instructions: String,
    pub image: Option<PatchImage>,
    pub response_schema: Value,
}

/// A generative model that answers with a JSON value.
///
/// Implementations own the transport; the adapter owns the prompt and the
/// reply validation. Each call is independent.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Provider/model label for logs.
    fn label(&self) -> String;

    async fn generate(&self, request: ModelRequest) -> Result<Value, VisionError>;
}
