//! Location refinement for volunteer ride requests.
//!
//! A thin single-call wrapper: validate the form, ask the model once, return
//! the refined location or a stable failure message.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use vision::{enhance_location, GenerativeModel, VisionConfig};

use crate::analyzer::{FieldErrors, INVALID_FORM_MESSAGE, SUCCESS_MESSAGE};
use crate::error::LocationError;

pub const INITIAL_LOCATION_FIELD: &str = "initialLocation";
pub const FEEDBACK_FIELD: &str = "volunteerFeedback";
pub const INITIAL_LOCATION_REQUIRED: &str = "Initial location is required.";
pub const FEEDBACK_REQUIRED: &str = "Feedback cannot be empty.";
pub const ENHANCE_FAILED_MESSAGE: &str = "Failed to enhance location. Please try again.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceLocationRequest {
    #[serde(rename = "initialLocation", default)]
    pub initial_location: Option<String>,
    #[serde(rename = "volunteerFeedback", default)]
    pub volunteer_feedback: Option<String>,
}

impl EnhanceLocationRequest {
    pub fn new(initial_location: impl Into<String>, volunteer_feedback: impl Into<String>) -> Self {
        Self {
            initial_location: Some(initial_location.into()),
            volunteer_feedback: Some(volunteer_feedback.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnhanceLocationResponse {
    Success {
        message: String,
        #[serde(rename = "enhancedLocation")]
        enhanced_location: String,
    },
    Invalid {
        message: String,
        errors: FieldErrors,
    },
    Failed {
        message: String,
    },
}

impl EnhanceLocationResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, EnhanceLocationResponse::Success { .. })
    }
}

/// Shares the analyzer's model; holds no per-request state.
#[derive(Clone)]
pub struct LocationEnhancer {
    model: Arc<dyn GenerativeModel>,
    vision: VisionConfig,
}

impl LocationEnhancer {
    pub fn new(model: Arc<dyn GenerativeModel>, vision: VisionConfig) -> Self {
        Self { model, vision }
    }

    pub async fn enhance(&self, request: &EnhanceLocationRequest) -> Result<String, LocationError> {
        let Some(initial) = request.initial_location.as_deref() else {
            return Err(LocationError::Validation {
                field: INITIAL_LOCATION_FIELD,
                message: INITIAL_LOCATION_REQUIRED,
            });
        };
        let feedback = request
            .volunteer_feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(LocationError::Validation {
                field: FEEDBACK_FIELD,
                message: FEEDBACK_REQUIRED,
            })?;

        let location = enhance_location(self.model.as_ref(), initial.trim(), feedback, &self.vision)
            .await
            .inspect_err(|err| {
                error!(model = %self.model.label(), error = %err, "location_upstream_error")
            })?;
        info!(chars = location.chars().count(), "location_enhanced");
        Ok(location)
    }

    /// [`enhance`](Self::enhance), rendered as the stable outbound shape.
    pub async fn respond(&self, request: &EnhanceLocationRequest) -> EnhanceLocationResponse {
        match self.enhance(request).await {
            Ok(enhanced_location) => EnhanceLocationResponse::Success {
                message: SUCCESS_MESSAGE.into(),
                enhanced_location,
            },
            Err(LocationError::Validation { field, message }) => {
                let mut errors = FieldErrors::new();
                errors.insert(field.to_string(), vec![message.to_string()]);
                EnhanceLocationResponse::Invalid {
                    message: INVALID_FORM_MESSAGE.into(),
                    errors,
                }
            }
            Err(LocationError::Upstream(_)) => EnhanceLocationResponse::Failed {
                message: ENHANCE_FAILED_MESSAGE.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vision::{StubModel, VisionError};

    fn enhancer(model: StubModel) -> (LocationEnhancer, Arc<StubModel>) {
        let model = Arc::new(model);
        (LocationEnhancer::new(model.clone(), VisionConfig::stub()), model)
    }

    #[tokio::test]
    async fn success_shape() {
        let (enhancer, _) = enhancer(
            StubModel::normal()
                .with_location_reply(json!({ "enhancedLocation": "Bus stop 12, Oak Ave" })),
        );
        let response = enhancer
            .respond(&EnhanceLocationRequest::new("Oak Ave", "by the bus stop"))
            .await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "message": "Success", "enhancedLocation": "Bus stop 12, Oak Ave" })
        );
    }

    #[tokio::test]
    async fn empty_feedback_is_rejected_without_model_call() {
        let (enhancer, model) = enhancer(StubModel::normal());
        let response = enhancer
            .respond(&EnhanceLocationRequest::new("Oak Ave", "   "))
            .await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "message": "Invalid form data.",
                "errors": { "volunteerFeedback": ["Feedback cannot be empty."] }
            })
        );
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn blank_initial_location_is_allowed() {
        let (enhancer, model) = enhancer(StubModel::normal());
        assert!(enhancer
            .respond(&EnhanceLocationRequest::new("", "corner of 5th and Main"))
            .await
            .is_success());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn missing_initial_location_is_rejected() {
        let (enhancer, _) = enhancer(StubModel::normal());
        let request = EnhanceLocationRequest {
            initial_location: None,
            volunteer_feedback: Some("north gate".into()),
        };
        let err = enhancer.enhance(&request).await.unwrap_err();
        assert!(matches!(
            err,
            LocationError::Validation { field: INITIAL_LOCATION_FIELD, .. }
        ));
    }

    #[tokio::test]
    async fn upstream_failure_is_generic() {
        let (enhancer, _) = enhancer(StubModel::failing(VisionError::Request("dns".into())));
        let response = enhancer
            .respond(&EnhanceLocationRequest::new("Oak Ave", "by the park"))
            .await;
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"message":"Failed to enhance location. Please try again."}"#
        );
    }
}
