use thiserror::Error;

/// A model reply that does not satisfy the indicator schema.
///
/// Any of these is a hard failure: a reading is never fabricated or
/// defaulted when the reply is incomplete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("model reply must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("model reply is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("model reply field `{field}` must be a string, got {found}")]
    NotAString {
        field: &'static str,
        found: &'static str,
    },

    #[error("model reply field `{0}` is blank")]
    BlankField(&'static str),
}

/// Inconsistent [`DerivationPolicy`](crate::DerivationPolicy).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("derivation.version must be >= 1")]
    InvalidVersion,

    #[error("derivation policy has no indicator rules")]
    NoRules,

    #[error("rule {index} ({indicator}) has no keywords")]
    NoKeywords { index: usize, indicator: String },

    #[error("rule {index} ({indicator}) has a blank keyword")]
    BlankKeyword { index: usize, indicator: String },

    #[error("rule {index} ({indicator}) has a blank finding sentence")]
    BlankFinding { index: usize, indicator: String },

    #[error("thresholds.urgent_at must be >= 1")]
    ZeroUrgentThreshold,

    #[error("thresholds.urgent_at ({urgent_at}) exceeds the number of rules ({rules}); urgent can never trigger")]
    UrgentUnreachable { urgent_at: usize, rules: usize },

    #[error("thresholds.monitor_at ({monitor_at}) must be in 1..urgent_at ({urgent_at}); monitor can never trigger")]
    MonitorUnreachable { monitor_at: usize, urgent_at: usize },

    #[error("without a monitor tier, urgent_at must be 1 (got {0}); abnormal findings would report healthy")]
    FindingsBelowUrgent(usize),
}

/// String that is not one of `healthy`, `monitor`, `urgent`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown health status: {0:?}")]
pub struct ParseStatusError(pub String);
