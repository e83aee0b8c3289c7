//! The status derivation engine.
//!
//! A pure, total function from three color strings to a [`Derivation`]. No
//! clock, no randomness, no I/O: the same reading under the same policy
//! always yields the same status, findings and details. Unrecognized
//! vocabulary is simply "no finding" for that spot.
use std::sync::OnceLock;

use crate::policy::{DerivationPolicy, StatusThresholds};
use crate::types::{Derivation, Finding, HealthStatus, IndicatorReading};

/// Derive status, findings and details for `reading` under `policy`.
///
/// ```rust
/// use indicator::{derive, DerivationPolicy, HealthStatus, IndicatorReading};
///
/// let reading = IndicatorReading::new("yellow", "clear", "blue");
/// let derivation = derive(&reading, &DerivationPolicy::default());
///
/// assert_eq!(derivation.status, HealthStatus::Monitor);
/// assert_eq!(
///     derivation.details,
///     "Abnormal indicators: High pH (acidic) detected."
/// );
/// ```
pub fn derive(reading: &IndicatorReading, policy: &DerivationPolicy) -> Derivation {
    let findings: Vec<Finding> = policy
        .rules
        .iter()
        .filter(|rule| rule.matches(reading.get(rule.indicator)))
        .map(|rule| Finding {
            indicator: rule.indicator,
            message: rule.finding.clone(),
        })
        .collect();

    let status = status_for_count(findings.len(), &policy.thresholds);
    let details = details_for(&findings, policy);

    Derivation {
        status,
        findings,
        details,
    }
}

/// [`derive`] under the default three-spot policy.
pub fn derive_default(ph: &str, lactate: &str, temp: &str) -> Derivation {
    derive(&IndicatorReading::new(ph, lactate, temp), default_policy())
}

/// Map a finding count to a status.
pub fn status_for_count(count: usize, thresholds: &StatusThresholds) -> HealthStatus {
    if count >= thresholds.urgent_at {
        return HealthStatus::Urgent;
    }
    match thresholds.monitor_at {
        Some(monitor_at) if count >= monitor_at => HealthStatus::Monitor,
        _ => HealthStatus::Healthy,
    }
}

fn details_for(findings: &[Finding], policy: &DerivationPolicy) -> String {
    if findings.is_empty() {
        return policy.normal_details.clone();
    }
    let sentences: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
    format!("{}{}", policy.abnormal_prefix, sentences.join(" "))
}

fn default_policy() -> &'static DerivationPolicy {
    static POLICY: OnceLock<DerivationPolicy> = OnceLock::new();
    POLICY.get_or_init(DerivationPolicy::default)
}
