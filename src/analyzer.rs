use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicator::{derive, AnalysisResult, DerivationPolicy, IndicatorReading};
use intake::{normalize_field, IntakeConfig, PatchImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vision::{
    build_model, execute_with_retry_async, read_indicators, GenerativeModel, RetryConfig,
    VisionConfig, VisionError,
};

use crate::error::AnalysisError;
use crate::location::LocationEnhancer;
use crate::metrics::MetricsSpan;

pub const SUCCESS_MESSAGE: &str = "Success";
pub const INVALID_FORM_MESSAGE: &str = "Invalid form data.";
pub const ANALYZE_FAILED_MESSAGE: &str = "Failed to analyze patch. Please try again.";

/// Field name to user-facing messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Inbound analysis request, as posted by the capture form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "imageDataUri", default)]
    pub image_data_uri: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(image_data_uri: impl Into<String>) -> Self {
        Self {
            image_data_uri: Some(image_data_uri.into()),
        }
    }
}

/// Outbound shape; always one of three.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Success {
        message: String,
        result: AnalysisResult,
    },
    Invalid {
        message: String,
        errors: FieldErrors,
    },
    Failed {
        message: String,
    },
}

impl AnalyzeResponse {
    pub fn success(result: AnalysisResult) -> Self {
        AnalyzeResponse::Success {
            message: SUCCESS_MESSAGE.into(),
            result,
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AnalyzeResponse::Invalid {
            message: INVALID_FORM_MESSAGE.into(),
            errors,
        }
    }

    pub fn failed() -> Self {
        AnalyzeResponse::Failed {
            message: ANALYZE_FAILED_MESSAGE.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AnalyzeResponse::Success { message, .. }
            | AnalyzeResponse::Invalid { message, .. }
            | AnalyzeResponse::Failed { message } => message,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalyzeResponse::Success { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalyzeResponse::Success { .. })
    }
}

/// Per-request lifecycle. Nothing survives past `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisStage {
    Received,
    Validating,
    AwaitingModel,
    Deriving,
    Completed,
    Failed,
}

impl AnalysisStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStage::Received => "received",
            AnalysisStage::Validating => "validating",
            AnalysisStage::AwaitingModel => "awaiting_model",
            AnalysisStage::Deriving => "deriving",
            AnalysisStage::Completed => "completed",
            AnalysisStage::Failed => "failed",
        }
    }

    /// Legal edges of the lifecycle.
    pub fn can_transition_to(self, next: AnalysisStage) -> bool {
        use AnalysisStage::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, AwaitingModel)
                | (Validating, Failed)
                | (AwaitingModel, Deriving)
                | (AwaitingModel, Failed)
                | (Deriving, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStage::Completed | AnalysisStage::Failed)
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logs each stage change of one analysis.
struct StageTracker {
    stage: AnalysisStage,
    start: Instant,
}

impl StageTracker {
    fn new() -> Self {
        debug!(stage = AnalysisStage::Received.as_str(), "analysis_stage");
        Self {
            stage: AnalysisStage::Received,
            start: Instant::now(),
        }
    }

    fn advance(&mut self, next: AnalysisStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        debug!(
            from = self.stage.as_str(),
            stage = next.as_str(),
            elapsed_micros = self.start.elapsed().as_micros() as u64,
            "analysis_stage"
        );
        self.stage = next;
    }

    fn fail(&mut self, err: &AnalysisError) -> AnalysisError {
        let from = self.stage;
        self.advance(AnalysisStage::Failed);
        warn!(
            from = from.as_str(),
            kind = err.kind(),
            elapsed_micros = self.start.elapsed().as_micros() as u64,
            "analysis_failed"
        );
        err.clone()
    }
}

/// Runtime configuration of an [`Analyzer`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub intake: IntakeConfig,
    pub vision: VisionConfig,
    pub policy: DerivationPolicy,
    /// `None` means exactly one model call per analysis.
    pub retry: Option<RetryConfig>,
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.intake
            .validate()
            .map_err(|e| AnalysisError::Config(format!("intake: {e}")))?;
        self.vision
            .validate()
            .map_err(|e| AnalysisError::Config(format!("vision: {e}")))?;
        self.policy
            .validate()
            .map_err(|e| AnalysisError::Config(format!("derivation: {e}")))?;
        if let Some(retry) = &self.retry {
            retry
                .validate()
                .map_err(|e| AnalysisError::Config(format!("retry: {e}")))?;
        }
        Ok(())
    }

    /// Longest an analysis can spend waiting on the model: every attempt
    /// running into `vision.timeout_secs`, plus the retry sleeps between them.
    pub fn worst_case_duration(&self) -> Duration {
        match &self.retry {
            None => self.vision.timeout(),
            Some(retry) => self
                .vision
                .timeout()
                .saturating_mul(retry.max_retries.saturating_add(1))
                .saturating_add(retry.worst_case_delay()),
        }
    }
}

/// The patch-analysis pipeline: validate, ask the model, derive, assemble.
///
/// Cheap to share: clone it or wrap it in an `Arc`; every call is
/// independent and holds no state between requests.
#[derive(Clone)]
pub struct Analyzer {
    model: Arc<dyn GenerativeModel>,
    cfg: Arc<AnalyzerConfig>,
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("model", &self.model.label())
            .field("cfg", &self.cfg)
            .finish()
    }
}

impl Analyzer {
    /// Build an analyzer around an existing model.
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        cfg: AnalyzerConfig,
    ) -> Result<Self, AnalysisError> {
        cfg.validate()?;
        Ok(Self {
            model,
            cfg: Arc::new(cfg),
        })
    }

    /// Build an analyzer whose model is chosen by `cfg.vision.provider`.
    pub fn from_config(cfg: AnalyzerConfig) -> Result<Self, AnalysisError> {
        let model = build_model(&cfg.vision)
            .map_err(|e| AnalysisError::Config(format!("vision: {e}")))?;
        Self::new(model, cfg)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.cfg
    }

    pub fn model(&self) -> Arc<dyn GenerativeModel> {
        Arc::clone(&self.model)
    }

    /// A location enhancer sharing this analyzer's model and vision settings.
    pub fn location_enhancer(&self) -> LocationEnhancer {
        LocationEnhancer::new(self.model(), self.cfg.vision.clone())
    }

    /// Run one analysis end to end. Never returns a partial result.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalysisError> {
        let mut tracker = StageTracker::new();

        tracker.advance(AnalysisStage::Validating);
        let image = match self.validate(request) {
            Ok(image) => image,
            Err(err) => return Err(tracker.fail(&err)),
        };

        tracker.advance(AnalysisStage::AwaitingModel);
        let reading = match self.read(&image).await {
            Ok(reading) => reading,
            Err(err) => {
                error!(model = %self.model.label(), error = %err, "upstream_model_error");
                return Err(tracker.fail(&AnalysisError::from(err)));
            }
        };

        tracker.advance(AnalysisStage::Deriving);
        let span = MetricsSpan::start();
        let derivation = derive(&reading, &self.cfg.policy);
        if let Some(span) = span {
            span.record_derivation(derivation.status);
        }

        tracker.advance(AnalysisStage::Completed);
        info!(
            status = derivation.status.as_str(),
            findings = derivation.findings.len(),
            elapsed_micros = tracker.start.elapsed().as_micros() as u64,
            "analysis_completed"
        );
        Ok(AnalysisResult::new(reading, derivation))
    }

    /// [`analyze`](Self::analyze), rendered as the stable outbound shape.
    ///
    /// Upstream causes are logged, never returned.
    pub async fn respond(&self, request: &AnalyzeRequest) -> AnalyzeResponse {
        match self.analyze(request).await {
            Ok(result) => AnalyzeResponse::success(result),
            Err(AnalysisError::Validation(err)) => {
                AnalyzeResponse::invalid(err.field(), err.to_string())
            }
            Err(_) => AnalyzeResponse::failed(),
        }
    }

    fn validate(&self, request: &AnalyzeRequest) -> Result<PatchImage, AnalysisError> {
        let span = MetricsSpan::start();
        let result = normalize_field(request.image_data_uri.as_deref(), &self.cfg.intake);
        if let Some(span) = span {
            span.record_intake(result.as_ref().map(|_| ()).map_err(|e| e.clone()));
        }
        Ok(result?)
    }

    async fn read(&self, image: &PatchImage) -> Result<IndicatorReading, VisionError> {
        let span = MetricsSpan::start();
        let model = self.model.as_ref();
        let vision = &self.cfg.vision;

        let (result, attempts) = match &self.cfg.retry {
            None => (read_indicators(model, image, vision).await, 1),
            Some(retry) => {
                let outcome = execute_with_retry_async(
                    retry,
                    |attempt| {
                        if attempt > 0 {
                            warn!(attempt, model = %model.label(), "model_retry");
                        }
                        read_indicators(model, image, vision)
                    },
                    VisionError::is_retryable,
                )
                .await;
                let attempts = outcome.attempts;
                (outcome.into_result(), attempts)
            }
        };

        if let Some(span) = span {
            span.record_model(attempts, result.as_ref().map(|_| ()).map_err(|e| e.clone()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicator::HealthStatus;
    use serde_json::json;
    use vision::StubModel;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn analyzer(model: StubModel) -> (Analyzer, Arc<StubModel>) {
        let model = Arc::new(model);
        let analyzer = Analyzer::new(model.clone(), AnalyzerConfig::default()).unwrap();
        (analyzer, model)
    }

    #[tokio::test]
    async fn healthy_patch_round_trip() {
        let (analyzer, model) = analyzer(StubModel::normal());
        let result = analyzer.analyze(&AnalyzeRequest::new(PNG)).await.unwrap();
        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.details, "All indicators are normal.");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn model_status_is_never_trusted() {
        let (analyzer, _) = analyzer(StubModel::replying(json!({
            "ph": "yellow", "lactate": "purple", "temp": "blue",
            "status": "healthy", "details": "fine"
        })));
        let result = analyzer.analyze(&AnalyzeRequest::new(PNG)).await.unwrap();
        assert_eq!(result.status, HealthStatus::Urgent);
    }

    #[tokio::test]
    async fn missing_image_skips_model() {
        let (analyzer, model) = analyzer(StubModel::normal());
        let response = analyzer.respond(&AnalyzeRequest::default()).await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "message": "Invalid form data.",
                "errors": { "imageDataUri": ["Image data is required."] }
            })
        );
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_hides_cause() {
        let (analyzer, _) = analyzer(StubModel::failing(VisionError::Http {
            status: 500,
            body: "secret internal detail".into(),
        }));
        let response = analyzer.respond(&AnalyzeRequest::new(PNG)).await;
        let body = serde_json::to_string(&response).unwrap();
        assert_eq!(body, r#"{"message":"Failed to analyze patch. Please try again."}"#);
    }

    #[tokio::test]
    async fn retry_is_off_by_default() {
        let (analyzer, model) =
            analyzer(StubModel::normal().failing_first(1, VisionError::Request("reset".into())));
        assert!(analyzer.analyze(&AnalyzeRequest::new(PNG)).await.is_err());
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn worst_case_duration_counts_every_attempt() {
        let mut cfg = AnalyzerConfig::default();
        assert_eq!(cfg.worst_case_duration(), Duration::from_secs(30));

        cfg.retry = Some(RetryConfig::default().with_jitter(false));
        assert_eq!(
            cfg.worst_case_duration(),
            Duration::from_secs(90) + Duration::from_millis(750)
        );
    }

    #[tokio::test]
    async fn configured_retry_recovers_transient_failure() {
        let model = Arc::new(
            StubModel::colors("yellow", "clear", "blue")
                .failing_first(1, VisionError::Request("reset".into())),
        );
        let cfg = AnalyzerConfig {
            retry: Some(
                RetryConfig::default()
                    .with_max_retries(2)
                    .with_base_delay(std::time::Duration::from_millis(1))
                    .with_max_delay(std::time::Duration::from_millis(1)),
            ),
            ..Default::default()
        };
        let analyzer = Analyzer::new(model.clone(), cfg).unwrap();
        let result = analyzer.analyze(&AnalyzeRequest::new(PNG)).await.unwrap();
        assert_eq!(result.status, HealthStatus::Monitor);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn schema_violations_are_not_retried() {
        let model = Arc::new(StubModel::replying(json!({ "ph": "blue" })));
        let cfg = AnalyzerConfig {
            retry: Some(RetryConfig::default().with_max_retries(3)),
            ..Default::default()
        };
        let analyzer = Analyzer::new(model.clone(), cfg).unwrap();
        let err = analyzer.analyze(&AnalyzeRequest::new(PNG)).await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn invalid_policy_is_rejected_at_construction() {
        let cfg = AnalyzerConfig {
            policy: DerivationPolicy::default().with_thresholds(indicator::StatusThresholds {
                monitor_at: Some(3),
                urgent_at: 2,
            }),
            ..Default::default()
        };
        let err = Analyzer::new(Arc::new(StubModel::normal()), cfg).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(msg) if msg.starts_with("derivation:")));
    }

    #[test]
    fn stage_edges() {
        use AnalysisStage::*;
        assert!(Received.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Failed));
        assert!(AwaitingModel.can_transition_to(Failed));
        assert!(!Deriving.can_transition_to(Failed));
        assert!(!Received.can_transition_to(AwaitingModel));
        assert!(!Completed.can_transition_to(Validating));
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn response_shapes_round_trip() {
        let json = r#"{"message":"Invalid form data.","errors":{"imageDataUri":["x"]}}"#;
        let parsed: AnalyzeResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, AnalyzeResponse::Invalid { .. }));
        assert_eq!(parsed.message(), INVALID_FORM_MESSAGE);
        assert!(parsed.result().is_none());
    }

    #[test]
    fn request_uses_wire_field_name() {
        let request: AnalyzeRequest =
            serde_json::from_str(r#"{"imageDataUri":"data:image/png;base64,AA=="}"#).unwrap();
        assert_eq!(request, AnalyzeRequest::new("data:image/png;base64,AA=="));
        let empty: AnalyzeRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.image_data_uri.is_none());
    }
}
