use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseStatusError;

/// One physical indicator spot on the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Ph,
    Lactate,
    Temperature,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Indicator::Ph, Indicator::Lactate, Indicator::Temperature];

    /// Field name used in model replies and result payloads.
    pub fn field(self) -> &'static str {
        match self {
            Indicator::Ph => "ph",
            Indicator::Lactate => "lactate",
            Indicator::Temperature => "temp",
        }
    }

    /// Human label.
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Ph => "pH",
            Indicator::Lactate => "lactate",
            Indicator::Temperature => "temperature",
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Free-text colors reported by the vision model, one per spot.
///
/// Values are whatever vocabulary the model chose ("blue", "pale yellow",
/// "dark blue-ish"); they are never constrained to an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub ph: String,
    pub lactate: String,
    pub temp: String,
}

impl IndicatorReading {
    pub fn new(ph: impl Into<String>, lactate: impl Into<String>, temp: impl Into<String>) -> Self {
        Self {
            ph: ph.into(),
            lactate: lactate.into(),
            temp: temp.into(),
        }
    }

    /// Reading for a single spot.
    pub fn get(&self, indicator: Indicator) -> &str {
        match indicator {
            Indicator::Ph => &self.ph,
            Indicator::Lactate => &self.lactate,
            Indicator::Temperature => &self.temp,
        }
    }
}

/// Overall health status, ordered by severity: `Healthy < Monitor < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Monitor,
    Urgent,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 3] = [
        HealthStatus::Healthy,
        HealthStatus::Monitor,
        HealthStatus::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Monitor => "monitor",
            HealthStatus::Urgent => "urgent",
        }
    }

    /// The more severe of two statuses, e.g. across consecutive scans.
    pub fn worse(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }

    /// Whether the status should prompt the user to request help.
    pub fn requires_assistance(self) -> bool {
        self == HealthStatus::Urgent
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "healthy" => Ok(HealthStatus::Healthy),
            "monitor" => Ok(HealthStatus::Monitor),
            "urgent" => Ok(HealthStatus::Urgent),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A detected abnormal reading with its explanatory sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub indicator: Indicator,
    pub message: String,
}

/// Output of the derivation engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Derivation {
    pub status: HealthStatus,
    /// Findings in rule order.
    pub findings: Vec<Finding>,
    pub details: String,
}

impl Derivation {
    /// Spots that produced at least one finding, in rule order, deduplicated.
    pub fn bad_indicators(&self) -> Vec<Indicator> {
        let mut out: Vec<Indicator> = Vec::with_capacity(self.findings.len());
        for finding in &self.findings {
            if !out.contains(&finding.indicator) {
                out.push(finding.indicator);
            }
        }
        out
    }
}

/// The only artifact returned to callers of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub ph: String,
    pub lactate: String,
    pub temp: String,
    pub status: HealthStatus,
    pub details: String,
}

impl AnalysisResult {
    pub fn new(reading: IndicatorReading, derivation: Derivation) -> Self {
        let IndicatorReading { ph, lactate, temp } = reading;
        Self {
            ph,
            lactate,
            temp,
            status: derivation.status,
            details: derivation.details,
        }
    }

    pub fn reading(&self) -> IndicatorReading {
        IndicatorReading::new(&self.ph, &self.lactate, &self.temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ordered_by_severity() {
        assert!(HealthStatus::Healthy < HealthStatus::Monitor);
        assert!(HealthStatus::Monitor < HealthStatus::Urgent);
        assert_eq!(HealthStatus::default(), HealthStatus::Healthy);
    }

    #[test]
    fn worse_picks_the_more_severe_status() {
        for a in HealthStatus::ALL {
            for b in HealthStatus::ALL {
                let w = a.worse(b);
                assert!(w >= a && w >= b);
                assert_eq!(w, b.worse(a));
            }
        }
        assert_eq!(
            HealthStatus::Monitor.worse(HealthStatus::Healthy),
            HealthStatus::Monitor
        );
    }

    #[test]
    fn only_urgent_requires_assistance() {
        assert!(!HealthStatus::Healthy.requires_assistance());
        assert!(!HealthStatus::Monitor.requires_assistance());
        assert!(HealthStatus::Urgent.requires_assistance());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("URGENT".parse::<HealthStatus>().unwrap(), HealthStatus::Urgent);
        assert_eq!(" monitor ".parse::<HealthStatus>().unwrap(), HealthStatus::Monitor);
        assert!("critical".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
    }

    #[test]
    fn reading_get_maps_each_spot() {
        let reading = IndicatorReading::new("blue", "clear", "red");
        assert_eq!(reading.get(Indicator::Ph), "blue");
        assert_eq!(reading.get(Indicator::Lactate), "clear");
        assert_eq!(reading.get(Indicator::Temperature), "red");
    }

    #[test]
    fn indicator_field_names_match_wire_format() {
        let fields: Vec<_> = Indicator::ALL.iter().map(|i| i.field()).collect();
        assert_eq!(fields, vec!["ph", "lactate", "temp"]);
    }

    #[test]
    fn bad_indicators_are_deduplicated() {
        let derivation = Derivation {
            status: HealthStatus::Urgent,
            findings: vec![
                Finding {
                    indicator: Indicator::Lactate,
                    message: "a".into(),
                },
                Finding {
                    indicator: Indicator::Lactate,
                    message: "b".into(),
                },
                Finding {
                    indicator: Indicator::Temperature,
                    message: "c".into(),
                },
            ],
            details: String::new(),
        };
        assert_eq!(
            derivation.bad_indicators(),
            vec![Indicator::Lactate, Indicator::Temperature]
        );
    }

    #[test]
    fn analysis_result_serializes_flat() {
        let result = AnalysisResult {
            ph: "blue".into(),
            lactate: "clear".into(),
            temp: "blue".into(),
            status: HealthStatus::Healthy,
            details: "All indicators are normal.".into(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["temp"], "blue");
        assert_eq!(result.reading(), IndicatorReading::new("blue", "clear", "blue"));
    }
}
