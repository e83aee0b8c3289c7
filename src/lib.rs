//! Patch analysis for colorimetric health patches.
//!
//! This crate stitches together image intake, the vision adapter and the
//! status derivation engine so callers can go from a captured photo to an
//! actionable [`HealthStatus`] with a single call:
//!
//! 1. validate the inbound `imageDataUri` ([`intake`]),
//! 2. ask the vision model for the three spot colors ([`vision`]),
//! 3. derive status and details deterministically ([`indicator`]),
//! 4. return one [`AnalysisResult`], or a stable failure shape.
//!
//! ```
//! use std::sync::Arc;
//! use patchscan::{Analyzer, AnalyzerConfig, AnalyzeRequest, HealthStatus, StubModel};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let model = Arc::new(StubModel::colors("yellow", "purple", "red"));
//! let analyzer = Analyzer::new(model, AnalyzerConfig::default()).unwrap();
//!
//! let request = AnalyzeRequest::new("data:image/jpeg;base64,/9j/4A==");
//! let result = analyzer.analyze(&request).await.unwrap();
//! assert_eq!(result.status, HealthStatus::Urgent);
//! # }
//! ```

mod analyzer;
pub mod config;
mod error;
pub mod location;
mod metrics;

pub use crate::analyzer::{
    ANALYZE_FAILED_MESSAGE, AnalysisStage, AnalyzeRequest, AnalyzeResponse, Analyzer,
    AnalyzerConfig, FieldErrors, INVALID_FORM_MESSAGE, SUCCESS_MESSAGE,
};
pub use crate::config::{ConfigLoadError, PatchscanConfig};
pub use crate::error::{AnalysisError, LocationError};
pub use crate::location::{EnhanceLocationRequest, EnhanceLocationResponse, LocationEnhancer};
pub use crate::metrics::{AnalysisMetrics, set_analysis_metrics};

pub use indicator::{
    AnalysisResult, Derivation, DerivationPolicy, Finding, HealthStatus, Indicator,
    IndicatorReading, StatusThresholds, derive, derive_default,
};
pub use intake::{IMAGE_FIELD, ImageInput, IntakeConfig, IntakeError, PatchImage};
pub use vision::{
    GenerativeModel, HttpModel, ProviderKind, RetryConfig, StubModel, VisionConfig, VisionError,
};
