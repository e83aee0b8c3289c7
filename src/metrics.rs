//! Optional, process-wide observer for analysis stage latencies.
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use indicator::HealthStatus;
use intake::IntakeError;
use vision::VisionError;

/// Metrics observer for analysis stages.
pub trait AnalysisMetrics: Send + Sync {
    fn record_intake(&self, latency: Duration, result: Result<(), IntakeError>);
    /// `attempts` is 1 unless retries are configured.
    fn record_model(&self, latency: Duration, attempts: u32, result: Result<(), VisionError>);
    fn record_derivation(&self, latency: Duration, status: HealthStatus);
}

/// Install or clear the global analysis metrics recorder.
pub fn set_analysis_metrics(recorder: Option<Arc<dyn AnalysisMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn AnalysisMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn AnalysisMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn AnalysisMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn AnalysisMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_intake(self, result: Result<(), IntakeError>) {
        self.recorder.record_intake(self.start.elapsed(), result);
    }

    pub(crate) fn record_model(self, attempts: u32, result: Result<(), VisionError>) {
        self.recorder
            .record_model(self.start.elapsed(), attempts, result);
    }

    pub(crate) fn record_derivation(self, status: HealthStatus) {
        self.recorder.record_derivation(self.start.elapsed(), status);
    }
}
