//! Provider wire formats: request payloads and reply extraction.
use serde_json::{json, Map, Value};

use crate::config::ProviderKind;
use crate::error::VisionError;
use crate::model::ModelRequest;

pub(crate) fn build_payload(
    provider: ProviderKind,
    model_name: &str,
    request: &ModelRequest,
) -> Result<Value, VisionError> {
    match provider {
        ProviderKind::Gemini => Ok(gemini_payload(request)),
        ProviderKind::OpenAi => Ok(openai_payload(model_name, request)),
        ProviderKind::Custom => Ok(custom_payload(model_name, request)),
        ProviderKind::Stub => Err(VisionError::InvalidConfig(
            "the stub provider does not build HTTP payloads".into(),
        )),
    }
}

fn gemini_payload(request: &ModelRequest) -> Value {
    let mut parts = vec![json!({ "text": request.instructions })];
    if let Some(image) = &request.image {
        parts.push(json!({
            "inline_data": {
                "mime_type": image.mime_type(),
                "data": image.data(),
            }
        }));
    }
    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": gemini_schema(&request.response_schema),
        }
    })
}

/// Gemini expects upper-case OpenAPI type names.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let converted: Map<String, Value> = map
                .iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", Value::String(t)) => Value::String(t.to_ascii_uppercase()),
                        _ => gemini_schema(value),
                    };
                    (key.clone(), value)
                })
                .collect();
            Value::Object(converted)
        }
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}

fn openai_payload(model_name: &str, request: &ModelRequest) -> Value {
    let content = match &request.image {
        Some(image) => json!([
            { "type": "text", "text": request.instructions },
            { "type": "image_url", "image_url": { "url": image.to_data_uri() } },
        ]),
        None => Value::String(request.instructions.clone()),
    };
    json!({
        "model": model_name,
        "messages": [{ "role": "user", "content": content }],
        "response_format": { "type": "json_object" },
    })
}

fn custom_payload(model_name: &str, request: &ModelRequest) -> Value {
    let mut payload = json!({
        "model": model_name,
        "task": request.task.as_str(),
        "prompt": request.instructions,
        "schema": request.response_schema,
    });
    if let (Some(image), Value::Object(map)) = (&request.image, &mut payload) {
        map.insert("image".into(), Value::String(image.to_data_uri()));
    }
    payload
}

/// Pull the model's JSON answer out of the provider envelope.
pub(crate) fn extract_reply(provider: ProviderKind, response: Value) -> Result<Value, VisionError> {
    match provider {
        ProviderKind::Gemini => {
            let parts = response
                .pointer("/candidates/0/content/parts")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    let reason = response
                        .pointer("/promptFeedback/blockReason")
                        .and_then(Value::as_str)
                        .unwrap_or("no candidates");
                    VisionError::InvalidResponse(format!("gemini reply has no content ({reason})"))
                })?;
            let text: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            parse_reply_text(&text)
        }
        ProviderKind::OpenAi => {
            let text = response
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    VisionError::InvalidResponse("openai reply has no message content".into())
                })?;
            parse_reply_text(text)
        }
        ProviderKind::Custom | ProviderKind::Stub => unwrap_custom(response),
    }
}

fn unwrap_custom(response: Value) -> Result<Value, VisionError> {
    match response {
        Value::String(text) => parse_reply_text(&text),
        Value::Object(mut map) => match map.remove("output") {
            Some(inner) => unwrap_custom(inner),
            None => Ok(Value::Object(map)),
        },
        other => Ok(other),
    }
}

/// Parse reply text as JSON, tolerating a surrounding Markdown code fence.
pub(crate) fn parse_reply_text(text: &str) -> Result<Value, VisionError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(VisionError::InvalidResponse("model reply is empty".into()));
    }
    serde_json::from_str(body)
        .map_err(|e| VisionError::InvalidResponse(format!("model reply is not JSON: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelTask;
    use intake::{normalize_image, ImageInput, IntakeConfig};

    fn patch_request() -> ModelRequest {
        let image = normalize_image(
            &ImageInput::data_uri("data:image/png;base64,iVBORw=="),
            &IntakeConfig::default(),
        )
        .unwrap();
        ModelRequest {
            task: ModelTask::ReadIndicators,
            instructions: "read the spots".into(),
            image: Some(image),
            response_schema: indicator::reply_json_schema(),
        }
    }

    #[test]
    fn gemini_payload_inlines_image_and_schema() {
        let payload =
            build_payload(ProviderKind::Gemini, "gemini-1.5-pro", &patch_request()).unwrap();
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "read the spots");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "iVBORw==");
        let config = &payload["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
        assert_eq!(config["responseSchema"]["properties"]["ph"]["type"], "STRING");
    }

    #[test]
    fn openai_payload_uses_data_uri_part() {
        let payload = build_payload(ProviderKind::OpenAi, "gpt-4o", &patch_request()).unwrap();
        assert_eq!(payload["model"], "gpt-4o");
        let content = &payload["messages"][0]["content"];
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,iVBORw==");
        assert_eq!(payload["response_format"]["type"], "json_object");
    }

    #[test]
    fn text_only_openai_payload_is_plain_string() {
        let request = ModelRequest {
            task: ModelTask::EnhanceLocation,
            instructions: "where?".into(),
            image: None,
            response_schema: json!({}),
        };
        let payload = build_payload(ProviderKind::OpenAi, "gpt-4o", &request).unwrap();
        assert_eq!(payload["messages"][0]["content"], "where?");
    }

    #[test]
    fn custom_payload_carries_task_and_image() {
        let payload = build_payload(ProviderKind::Custom, "local", &patch_request()).unwrap();
        assert_eq!(payload["task"], "read_indicators");
        assert_eq!(payload["image"], "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn stub_has_no_payload() {
        assert!(build_payload(ProviderKind::Stub, "stub", &patch_request()).is_err());
    }

    #[test]
    fn gemini_reply_text_is_parsed() {
        let response = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"ph\":\"blue\",\"lactate\":\"clear\",\"temp\":\"blue\"}" }] }
            }]
        });
        let reply = extract_reply(ProviderKind::Gemini, response).unwrap();
        assert_eq!(reply["lactate"], "clear");
    }

    #[test]
    fn gemini_block_reason_is_reported() {
        let response = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = extract_reply(ProviderKind::Gemini, response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn openai_reply_with_code_fence_is_parsed() {
        let response = json!({
            "choices": [{ "message": { "content": "```json\n{\"ph\":\"yellow\"}\n```" } }]
        });
        let reply = extract_reply(ProviderKind::OpenAi, response).unwrap();
        assert_eq!(reply["ph"], "yellow");
    }

    #[test]
    fn custom_reply_accepts_direct_object_and_output_wrapper() {
        let direct = extract_reply(ProviderKind::Custom, json!({"ph": "blue"})).unwrap();
        assert_eq!(direct["ph"], "blue");
        let wrapped =
            extract_reply(ProviderKind::Custom, json!({"output": "{\"ph\":\"red\"}"})).unwrap();
        assert_eq!(wrapped["ph"], "red");
    }

    #[test]
    fn non_json_text_is_invalid_response() {
        let err = parse_reply_text("the spots are blue").unwrap_err();
        assert!(matches!(err, VisionError::InvalidResponse(_)));
        assert!(matches!(
            parse_reply_text("   "),
            Err(VisionError::InvalidResponse(_))
        ));
    }
}
