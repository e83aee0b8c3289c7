//! Derivation policy: which colors count as abnormal and how many findings
//! escalate to which status.
//!
//! The default policy is the three-spot patch with severity counting
//! (one finding → monitor, two or more → urgent). Other patch layouts and
//! escalation rules are expressed by editing the rules and thresholds rather
//! than by changing the engine.
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::types::Indicator;

pub const PH_FINDING: &str = "High pH (acidic) detected.";
pub const LACTATE_FINDING: &str = "High lactate (anaerobic metabolism) indicated.";
pub const TEMPERATURE_FINDING: &str = "High temperature (fever/inflammation) indicated.";
pub const NORMAL_DETAILS: &str = "All indicators are normal.";
pub const ABNORMAL_PREFIX: &str = "Abnormal indicators: ";

/// One abnormal-color check against a single spot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub indicator: Indicator,
    /// Matched as case-insensitive substrings; any match fires the rule.
    pub keywords: Vec<String>,
    /// Sentence appended to the details when the rule fires.
    pub finding: String,
}

impl IndicatorRule {
    pub fn new(indicator: Indicator, keywords: &[&str], finding: impl Into<String>) -> Self {
        Self {
            indicator,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            finding: finding.into(),
        }
    }

    /// Whether `reading` contains any of the rule's keywords.
    pub fn matches(&self, reading: &str) -> bool {
        let reading = reading.to_lowercase();
        self.keywords
            .iter()
            .any(|keyword| reading.contains(&keyword.to_lowercase()))
    }
}

/// Finding counts at which the status escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusThresholds {
    /// Findings needed for `monitor`; `None` disables the tier.
    pub monitor_at: Option<usize>,
    /// Findings needed for `urgent`.
    pub urgent_at: usize,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            monitor_at: Some(1),
            urgent_at: 2,
        }
    }
}

impl StatusThresholds {
    /// Every abnormal finding is urgent; there is no monitor tier.
    pub fn any_abnormal_urgent() -> Self {
        Self {
            monitor_at: None,
            urgent_at: 1,
        }
    }
}

/// Full configuration of the derivation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationPolicy {
    pub version: u32,
    /// Evaluated in order; findings keep this order.
    pub rules: Vec<IndicatorRule>,
    pub thresholds: StatusThresholds,
    /// Details text when nothing is abnormal.
    pub normal_details: String,
    /// Prefix placed before the joined finding sentences.
    pub abnormal_prefix: String,
}

impl Default for DerivationPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            rules: vec![
                IndicatorRule::new(Indicator::Ph, &["yellow"], PH_FINDING),
                IndicatorRule::new(
                    Indicator::Lactate,
                    &["dark blue", "purple"],
                    LACTATE_FINDING,
                ),
                IndicatorRule::new(Indicator::Temperature, &["red"], TEMPERATURE_FINDING),
            ],
            thresholds: StatusThresholds::default(),
            normal_details: NORMAL_DETAILS.to_string(),
            abnormal_prefix: ABNORMAL_PREFIX.to_string(),
        }
    }
}

impl DerivationPolicy {
    pub fn with_thresholds(mut self, thresholds: StatusThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Keep only the rules for the given spots, e.g. for a two-spot patch.
    pub fn restricted_to(mut self, indicators: &[Indicator]) -> Self {
        self.rules.retain(|rule| indicators.contains(&rule.indicator));
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.version == 0 {
            return Err(PolicyError::InvalidVersion);
        }
        if self.rules.is_empty() {
            return Err(PolicyError::NoRules);
        }
        for (index, rule) in self.rules.iter().enumerate() {
            let indicator = rule.indicator.label().to_string();
            if rule.keywords.is_empty() {
                return Err(PolicyError::NoKeywords { index, indicator });
            }
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(PolicyError::BlankKeyword { index, indicator });
            }
            if rule.finding.trim().is_empty() {
                return Err(PolicyError::BlankFinding { index, indicator });
            }
        }

        let StatusThresholds {
            monitor_at,
            urgent_at,
        } = self.thresholds;
        if urgent_at == 0 {
            return Err(PolicyError::ZeroUrgentThreshold);
        }
        if urgent_at > self.rules.len() {
            return Err(PolicyError::UrgentUnreachable {
                urgent_at,
                rules: self.rules.len(),
            });
        }
        match monitor_at {
            Some(monitor_at) if monitor_at == 0 || monitor_at >= urgent_at => {
                Err(PolicyError::MonitorUnreachable {
                    monitor_at,
                    urgent_at,
                })
            }
            None if urgent_at != 1 => Err(PolicyError::FindingsBelowUrgent(urgent_at)),
            _ => Ok(()),
        }
    }
}
