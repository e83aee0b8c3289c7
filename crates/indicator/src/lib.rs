//! Indicator schema and status derivation for colorimetric health patches.
//!
//! A patch carries three spots (pH, lactate, temperature). A vision model
//! reports each spot's color as free text; this crate validates that reply
//! against a fixed schema and turns the three colors into a
//! [`HealthStatus`] plus a human-readable explanation.
//!
//! Derivation is a pure function of the reading and a [`DerivationPolicy`].
//! Model-proposed statuses are never trusted.
//!
//! ```rust
//! use indicator::{derive_default, reading_from_reply, AnalysisResult, HealthStatus};
//! use serde_json::json;
//!
//! let reply = json!({"ph": "yellow", "lactate": "purple", "temp": "blue"});
//! let reading = reading_from_reply(&reply).unwrap();
//! let derivation = derive_default(&reading.ph, &reading.lactate, &reading.temp);
//! let result = AnalysisResult::new(reading, derivation);
//!
//! assert_eq!(result.status, HealthStatus::Urgent);
//! ```

mod derive;
mod error;
pub mod policy;
pub mod schema;
mod types;

pub use crate::derive::{derive, derive_default, status_for_count};
pub use crate::error::{ParseStatusError, PolicyError, SchemaError};
pub use crate::policy::{DerivationPolicy, IndicatorRule, StatusThresholds};
pub use crate::schema::{reading_from_reply, reply_json_schema, READING_FIELDS, SCHEMA_VERSION};
pub use crate::types::{
    AnalysisResult, Derivation, Finding, HealthStatus, Indicator, IndicatorReading,
};
