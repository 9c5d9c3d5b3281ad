use reqwest::StatusCode;
use serde_json::Value;

use super::error::{ErrorKind, GatewayError};
use super::invoker::{UpstreamFailure, UpstreamReply};
use crate::models::ImageResponse;

pub const CHAT_FALLBACK_REPLY: &str = "Sorry, I could not generate a response.";
const IMAGE_BYTES_FIELD: &str = "bytesBase64Encoded";
const IMAGE_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Upstream JSON and status, forwarded untouched.
pub fn passthrough(reply: UpstreamReply) -> Result<NormalizedResponse, GatewayError> {
    let body = parse_json(&reply.body)?;
    Ok(NormalizedResponse {
        status: reply.status,
        body,
    })
}

/// Text of the first candidate. A body that parses but lacks the path yields
/// the fallback reply instead of an error.
pub fn chat_reply(reply: &UpstreamReply) -> Result<String, GatewayError> {
    let body = serde_json::from_str::<Value>(&reply.body)
        .map_err(|_| GatewayError::upstream_parse("Failed to parse AI response."))?;

    Ok(body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or(CHAT_FALLBACK_REPLY)
        .to_string())
}

/// Reshapes a prediction response into a PNG data URL. An embedded `error`
/// fails the request even when the outer status was 2xx.
pub fn image_reply(reply: &UpstreamReply, superprompt: &str) -> Result<ImageResponse, GatewayError> {
    let body = parse_json(&reply.body)?;

    if let Some(error) = body.get("error").filter(|error| !error.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown API error");
        return Err(GatewayError::upstream_reported(message));
    }

    let image_bytes = body
        .get("predictions")
        .and_then(|predictions| predictions.get(0))
        .and_then(|prediction| prediction.get(IMAGE_BYTES_FIELD))
        .and_then(Value::as_str)
        .filter(|encoded| !encoded.is_empty())
        .ok_or_else(|| {
            GatewayError::upstream_parse(format!(
                "Failed to parse AI response: Could not find '{IMAGE_BYTES_FIELD}' in API response."
            ))
        })?;

    Ok(ImageResponse {
        image_url: format!("{IMAGE_DATA_URL_PREFIX}{image_bytes}"),
        revised_prompt: superprompt.to_string(),
    })
}

/// Provider message from a JSON error body when there is one, else the
/// transport error text. Upstream status is kept when known.
pub fn upstream_failure(failure: UpstreamFailure) -> GatewayError {
    let message = failure
        .body
        .as_deref()
        .and_then(provider_error_message)
        .unwrap_or_else(|| format!("Failed to connect to AI service: {}", failure.message));

    GatewayError::new(
        ErrorKind::UpstreamTransportError,
        failure.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        message,
    )
}

fn provider_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(body).ok()?;
    parsed
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn parse_json(body: &str) -> Result<Value, GatewayError> {
    serde_json::from_str::<Value>(body).map_err(|_| {
        GatewayError::upstream_parse("Failed to parse AI response: body was not valid JSON.")
    })
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::{
        CHAT_FALLBACK_REPLY, chat_reply, image_reply, passthrough, upstream_failure,
    };
    use crate::gateway::error::ErrorKind;
    use crate::gateway::invoker::{UpstreamFailure, UpstreamReply};

    fn reply(status: StatusCode, body: serde_json::Value) -> UpstreamReply {
        UpstreamReply {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn passthrough_keeps_status_and_body() {
        let body = json!({ "candidates": [], "usageMetadata": { "totalTokenCount": 3 } });

        let normalized =
            passthrough(reply(StatusCode::ACCEPTED, body.clone())).expect("json should pass");

        assert_eq!(normalized.status, StatusCode::ACCEPTED);
        assert_eq!(normalized.body, body);
    }

    #[test]
    fn passthrough_rejects_non_json_body() {
        let err = passthrough(UpstreamReply {
            status: StatusCode::OK,
            body: "<html>".to_string(),
        })
        .expect_err("html should not pass");

        assert_eq!(err.kind, ErrorKind::UpstreamParseError);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn chat_reply_extracts_first_candidate_text() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello" }] } }]
        });

        assert_eq!(
            chat_reply(&reply(StatusCode::OK, body)).expect("reply should extract"),
            "Hello"
        );
    }

    #[test]
    fn chat_reply_falls_back_when_path_is_missing() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
            json!({ "candidates": [{ "finishReason": "SAFETY" }] }),
        ] {
            assert_eq!(
                chat_reply(&reply(StatusCode::OK, body)).expect("fallback is not an error"),
                CHAT_FALLBACK_REPLY
            );
        }
    }

    #[test]
    fn image_reply_builds_data_url() {
        let body = json!({ "predictions": [{ "bytesBase64Encoded": "iVBORw0KGgo=" }] });

        let response =
            image_reply(&reply(StatusCode::OK, body), "A hero").expect("image should extract");

        assert_eq!(response.image_url, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(response.revised_prompt, "A hero");
    }

    #[test]
    fn image_reply_without_bytes_names_missing_field() {
        let err = image_reply(&reply(StatusCode::OK, json!({ "predictions": [{}] })), "A hero")
            .expect_err("missing bytes should fail");

        assert_eq!(err.kind, ErrorKind::UpstreamParseError);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("bytesBase64Encoded"));
    }

    #[test]
    fn image_reply_treats_embedded_error_as_failure() {
        let body = json!({
            "error": { "code": 400, "message": "Image generation blocked." },
            "predictions": [{ "bytesBase64Encoded": "iVBORw0KGgo=" }]
        });

        let err = image_reply(&reply(StatusCode::OK, body), "A hero")
            .expect_err("embedded error should fail");

        assert_eq!(err.kind, ErrorKind::UpstreamReportedError);
        assert_eq!(err.message, "Image generation blocked.");
    }

    #[test]
    fn failure_prefers_provider_message_and_status() {
        let err = upstream_failure(UpstreamFailure {
            status: Some(StatusCode::FORBIDDEN),
            body: Some(
                json!({ "error": { "code": 403, "message": "API key not valid.", "status": "PERMISSION_DENIED" } })
                    .to_string(),
            ),
            message: "upstream returned status 403".to_string(),
        });

        assert_eq!(err.kind, ErrorKind::UpstreamTransportError);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "API key not valid.");
    }

    #[test]
    fn failure_without_json_body_uses_transport_message() {
        let err = upstream_failure(UpstreamFailure {
            status: Some(StatusCode::BAD_GATEWAY),
            body: Some("upstream proxy error".to_string()),
            message: "upstream returned status 502".to_string(),
        });

        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            err.message,
            "Failed to connect to AI service: upstream returned status 502"
        );
    }

    #[test]
    fn transport_failure_without_status_defaults_to_500() {
        let err = upstream_failure(UpstreamFailure {
            status: None,
            body: None,
            message: "error sending request".to_string(),
        });

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("Failed to connect to AI service:"));
    }
}
