//! Vision prompt adapter for colorimetric patches.
//!
//! One call, one image, one reply: [`read_indicators`] sends the fixed patch
//! prompt plus the embedded photo to a [`GenerativeModel`] and validates the
//! reply against the indicator schema. A reply that is missing any of the
//! three colors is an error, never a partial reading.
//!
//! The adapter does not retry and keeps no state between calls. Transport is
//! pluggable:
//!
//! - [`HttpModel`] talks to Gemini (default), OpenAI-compatible or custom
//!   endpoints over `reqwest`.
//! - [`StubModel`] answers from memory for tests and offline development.
//!
//! ```
//! use intake::{normalize_image, ImageInput, IntakeConfig};
//! use vision::{read_indicators, StubModel, VisionConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let image = normalize_image(
//!     &ImageInput::data_uri("data:image/png;base64,iVBORw=="),
//!     &IntakeConfig::default(),
//! )
//! .unwrap();
//! let model = StubModel::colors("yellow", "clear", "blue");
//!
//! let reading = read_indicators(&model, &image, &VisionConfig::stub()).await.unwrap();
//! assert_eq!(reading.ph, "yellow");
//! # }
//! ```
use std::sync::Arc;
use std::time::Instant;

use indicator::{reading_from_reply, reply_json_schema, IndicatorReading};
use intake::PatchImage;
use serde_json::{json, Value};
use tracing::{info, warn};

mod client;
mod config;
mod error;
mod model;
pub mod prompt;
mod provider;
pub mod retry;
mod serde_millis;
mod stub;

pub use crate::client::HttpModel;
pub use crate::config::{ProviderKind, VisionConfig, API_KEY_ENV, API_URL_ENV, MODEL_ENV};
pub use crate::error::VisionError;
pub use crate::model::{GenerativeModel, ModelRequest, ModelTask};
pub use crate::retry::{execute_with_retry_async, RetryConfig, RetryResult};
pub use crate::stub::StubModel;

/// Reply field carrying the refined location.
pub const ENHANCED_LOCATION_FIELD: &str = "enhancedLocation";

/// Build the model named by `cfg`: a [`StubModel`] for `stub`, an
/// [`HttpModel`] otherwise.
pub fn build_model(cfg: &VisionConfig) -> Result<Arc<dyn GenerativeModel>, VisionError> {
    match cfg.provider {
        ProviderKind::Stub => Ok(Arc::new(StubModel::normal())),
        _ => Ok(Arc::new(HttpModel::new(cfg.clone())?)),
    }
}

/// Ask `model` for the three spot colors in `image`.
///
/// Exactly one model call, bounded by `cfg.timeout()`.
pub async fn read_indicators(
    model: &dyn GenerativeModel,
    image: &PatchImage,
    cfg: &VisionConfig,
) -> Result<IndicatorReading, VisionError> {
    let request = ModelRequest {
        task: ModelTask::ReadIndicators,
        instructions: prompt::patch_instructions(),
        image: Some(image.clone()),
        response_schema: reply_json_schema(),
    };
    let reply = call_model(model, request, cfg).await?;
    Ok(reading_from_reply(&reply)?)
}

/// Ask `model` to refine a vague location using a volunteer's feedback.
pub async fn enhance_location(
    model: &dyn GenerativeModel,
    initial_location: &str,
    volunteer_feedback: &str,
    cfg: &VisionConfig,
) -> Result<String, VisionError> {
    let request = ModelRequest {
        task: ModelTask::EnhanceLocation,
        instructions: prompt::location_instructions(initial_location, volunteer_feedback),
        image: None,
        response_schema: location_json_schema(),
    };
    let reply = call_model(model, request, cfg).await?;
    match reply.get(ENHANCED_LOCATION_FIELD) {
        Some(Value::String(location)) if !location.trim().is_empty() => {
            Ok(location.trim().to_string())
        }
        _ => Err(VisionError::InvalidResponse(format!(
            "model reply is missing a non-blank `{ENHANCED_LOCATION_FIELD}`"
        ))),
    }
}

fn location_json_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            ENHANCED_LOCATION_FIELD: {
                "type": "string",
                "description": "A more accurate address or place for the user.",
            }
        },
        "required": [ENHANCED_LOCATION_FIELD],
    })
}

async fn call_model(
    model: &dyn GenerativeModel,
    request: ModelRequest,
    cfg: &VisionConfig,
) -> Result<Value, VisionError> {
    let task = request.task.as_str();
    let start = Instant::now();
    let outcome = match tokio::time::timeout(cfg.timeout(), model.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(VisionError::Timeout(cfg.timeout())),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &outcome {
        Ok(_) => info!(model = %model.label(), task, elapsed_ms, "model_reply"),
        Err(err) => warn!(
            model = %model.label(),
            task,
            elapsed_ms,
            kind = err.kind(),
            "model_failure"
        ),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicator::SchemaError;
    use intake::{normalize_image, ImageInput, IntakeConfig};
    use std::time::Duration;

    fn image() -> PatchImage {
        normalize_image(
            &ImageInput::data_uri("data:image/jpeg;base64,/9j/4A=="),
            &IntakeConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reads_three_colors_with_one_call() {
        let model = StubModel::colors("blue", "purple", "red");
        let reading = read_indicators(&model, &image(), &VisionConfig::stub())
            .await
            .unwrap();
        assert_eq!(reading, IndicatorReading::new("blue", "purple", "red"));
        assert_eq!(model.calls(), 1);

        let sent = model.last_request().unwrap();
        assert_eq!(sent.task, ModelTask::ReadIndicators);
        assert!(sent.instructions.starts_with(prompt::PATCH_PROMPT));
        assert_eq!(sent.image.unwrap().mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn incomplete_reply_is_a_schema_error() {
        let model = StubModel::replying(json!({ "ph": "blue", "temp": "blue" }));
        let err = read_indicators(&model, &image(), &VisionConfig::stub())
            .await
            .unwrap_err();
        assert_eq!(err, VisionError::Schema(SchemaError::MissingField("lactate")));
    }

    #[tokio::test]
    async fn model_failure_propagates_without_retry() {
        let model = StubModel::failing(VisionError::Http {
            status: 503,
            body: "overloaded".into(),
        });
        let err = read_indicators(&model, &image(), &VisionConfig::stub())
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::Http { status: 503, .. }));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let model = StubModel::normal().with_delay(Duration::from_secs(60));
        let cfg = VisionConfig {
            timeout_secs: 1,
            ..VisionConfig::stub()
        };
        let err = read_indicators(&model, &image(), &cfg).await.unwrap_err();
        assert_eq!(err, VisionError::Timeout(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn enhance_location_returns_trimmed_text() {
        let model = StubModel::normal()
            .with_location_reply(json!({ "enhancedLocation": "  12 Elm St, north entrance " }));
        let location = enhance_location(&model, "Elm St", "north entrance", &VisionConfig::stub())
            .await
            .unwrap();
        assert_eq!(location, "12 Elm St, north entrance");
        let sent = model.last_request().unwrap();
        assert!(sent.image.is_none());
        assert!(sent.instructions.contains("Volunteer Feedback: north entrance"));
    }

    #[tokio::test]
    async fn enhance_location_rejects_blank_reply() {
        let model = StubModel::normal().with_location_reply(json!({ "enhancedLocation": " " }));
        let err = enhance_location(&model, "a", "b", &VisionConfig::stub())
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::InvalidResponse(_)));
    }

    #[test]
    fn build_model_picks_stub() {
        let model = build_model(&VisionConfig::stub()).unwrap();
        assert_eq!(model.label(), "stub");
        assert!(build_model(&VisionConfig::default()).is_err());
    }
}
