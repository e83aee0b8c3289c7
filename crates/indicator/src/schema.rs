//! The contract between the vision model and the derivation engine.
//!
//! A reply must carry `ph`, `lactate` and `temp` as non-blank strings. Any
//! `status` or `details` the model volunteers is ignored; those are always
//! recomputed by [`derive`](crate::derive).
use serde_json::{json, Map, Value};

use crate::error::SchemaError;
use crate::types::{Indicator, IndicatorReading};

pub const SCHEMA_VERSION: u32 = 1;

/// Fields the model must return, in reply order.
pub const READING_FIELDS: [&str; 3] = ["ph", "lactate", "temp"];

/// Description sent to the model for each field.
pub fn field_description(indicator: Indicator) -> &'static str {
    match indicator {
        Indicator::Ph => "The color of the pH indicator.",
        Indicator::Lactate => "The color of the lactate indicator.",
        Indicator::Temperature => "The color of the temperature indicator.",
    }
}

/// Extract an [`IndicatorReading`] from a parsed model reply.
///
/// Values are trimmed but otherwise kept verbatim.
pub fn reading_from_reply(reply: &Value) -> Result<IndicatorReading, SchemaError> {
    let object = reply
        .as_object()
        .ok_or(SchemaError::NotAnObject(json_type(reply)))?;

    let ph = required_string(object, Indicator::Ph.field())?;
    let lactate = required_string(object, Indicator::Lactate.field())?;
    let temp = required_string(object, Indicator::Temperature.field())?;
    Ok(IndicatorReading::new(ph, lactate, temp))
}

/// JSON schema the model is asked to honor.
pub fn reply_json_schema() -> Value {
    let mut properties = Map::new();
    for indicator in Indicator::ALL {
        properties.insert(
            indicator.field().to_string(),
            json!({
                "type": "string",
                "description": field_description(indicator),
            }),
        );
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": READING_FIELDS,
    })
}

fn required_string<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(SchemaError::MissingField(field)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(SchemaError::BlankField(field))
            } else {
                Ok(trimmed)
            }
        }
        Some(other) => Err(SchemaError::NotAString {
            field,
            found: json_type(other),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
