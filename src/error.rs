use intake::IntakeError;
use thiserror::Error;
use vision::VisionError;

/// Why an analysis did not produce a result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// The inbound request failed image intake; reported field by field.
    #[error("invalid request: {0}")]
    Validation(#[from] IntakeError),

    /// The model call failed, timed out, or answered outside the schema.
    #[error("upstream model failure: {0}")]
    Upstream(#[from] VisionError),

    /// The analyzer was built from an inconsistent configuration.
    #[error("invalid analyzer configuration: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Validation(_) => "validation",
            AnalysisError::Upstream(_) => "upstream",
            AnalysisError::Config(_) => "config",
        }
    }
}

/// Why a location refinement did not produce a result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocationError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("upstream model failure: {0}")]
    Upstream(#[from] VisionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn intake_error_converts_to_validation() {
        let err: AnalysisError = IntakeError::MissingImage.into();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("Image data is required."));
    }

    #[test]
    fn vision_error_converts_to_upstream() {
        let err: AnalysisError = VisionError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(err.kind(), "upstream");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn location_validation_displays_message_only() {
        let err = LocationError::Validation {
            field: "volunteerFeedback",
            message: "Feedback cannot be empty.",
        };
        assert_eq!(err.to_string(), "Feedback cannot be empty.");
    }
}
