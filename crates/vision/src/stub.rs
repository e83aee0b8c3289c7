use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::VisionError;
use crate::model::{GenerativeModel, ModelRequest, ModelTask};

/// In-process model with canned behavior. Used for local development and
/// in tests; never touches the network.
///
/// ```
/// use vision::StubModel;
///
/// let model = StubModel::normal();
/// assert_eq!(model.calls(), 0);
/// ```
#[derive(Debug)]
pub struct StubModel {
    indicator_reply: Value,
    location_reply: Value,
    failure: Option<VisionError>,
    /// `None` fails every call; `Some(n)` fails only the first `n`.
    failure_budget: Option<usize>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ModelRequest>>,
}

impl StubModel {
    /// Reports every spot at its normal color.
    pub fn normal() -> Self {
        Self::replying(json!({ "ph": "blue", "lactate": "clear", "temp": "blue" }))
    }

    /// Answers indicator reads with `reply`, verbatim.
    pub fn replying(reply: Value) -> Self {
        Self {
            indicator_reply: reply,
            location_reply: json!({ "enhancedLocation": "Location confirmed by volunteer." }),
            failure: None,
            failure_budget: None,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Reports the given three colors.
    pub fn colors(ph: &str, lactate: &str, temp: &str) -> Self {
        Self::replying(json!({ "ph": ph, "lactate": lactate, "temp": temp }))
    }

    /// Fails every call with `error`.
    pub fn failing(error: VisionError) -> Self {
        Self {
            failure: Some(error),
            ..Self::normal()
        }
    }

    /// Fails the first `times` calls with `error`, then behaves like `self`.
    pub fn failing_first(mut self, times: usize, error: VisionError) -> Self {
        self.failure = Some(error);
        self.failure_budget = Some(times);
        self
    }

    pub fn with_location_reply(mut self, reply: Value) -> Self {
        self.location_reply = reply;
        self
    }

    /// Sleep before answering, to exercise timeouts and cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn should_fail(&self, call_index: usize) -> bool {
        match (&self.failure, self.failure_budget) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(budget)) => call_index < budget,
        }
    }
}

#[async_trait]
impl GenerativeModel for StubModel {
    fn label(&self) -> String {
        "stub".into()
    }

    async fn generate(&self, request: ModelRequest) -> Result<Value, VisionError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        let task = request.task;
        if let Ok(mut slot) = self.last_request.lock() {
            *slot = Some(request);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(call_index) {
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
        }

        Ok(match task {
            ModelTask::ReadIndicators => self.indicator_reply.clone(),
            ModelTask::EnhanceLocation => self.location_reply.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: ModelTask) -> ModelRequest {
        ModelRequest {
            task,
            instructions: "test".into(),
            image: None,
            response_schema: json!({}),
        }
    }

    #[tokio::test]
    async fn normal_stub_reports_normal_colors() {
        let model = StubModel::normal();
        let reply = model.generate(request(ModelTask::ReadIndicators)).await.unwrap();
        assert_eq!(reply, json!({ "ph": "blue", "lactate": "clear", "temp": "blue" }));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn location_task_gets_location_reply() {
        let model =
            StubModel::normal().with_location_reply(json!({ "enhancedLocation": "Gate 4" }));
        let reply = model.generate(request(ModelTask::EnhanceLocation)).await.unwrap();
        assert_eq!(reply["enhancedLocation"], "Gate 4");
        assert_eq!(
            model.last_request().map(|r| r.task),
            Some(ModelTask::EnhanceLocation)
        );
    }

    #[tokio::test]
    async fn failing_stub_always_fails_and_counts() {
        let model = StubModel::failing(VisionError::Request("down".into()));
        for _ in 0..3 {
            assert!(model.generate(request(ModelTask::ReadIndicators)).await.is_err());
        }
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn failing_first_recovers() {
        let model = StubModel::colors("yellow", "clear", "blue")
            .failing_first(2, VisionError::Timeout(Duration::from_secs(1)));
        assert!(model.generate(request(ModelTask::ReadIndicators)).await.is_err());
        assert!(model.generate(request(ModelTask::ReadIndicators)).await.is_err());
        let reply = model.generate(request(ModelTask::ReadIndicators)).await.unwrap();
        assert_eq!(reply["ph"], "yellow");
    }
}
