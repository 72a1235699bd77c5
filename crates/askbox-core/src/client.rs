use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::error::AskError;

/// Shown when a successful response carries no usable answer.
pub const NO_ANSWER: &str = "No answer received.";

/// Request body sent to the answering endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub question: String,
}

impl AskRequest {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
        }
    }
}

/// Status and body of whatever came back. The body is left empty for
/// non-2xx replies since it is never looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one question to the endpoint. Exactly one HTTP exchange per call,
/// no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, request: &AskRequest) -> Result<HttpReply, AskError>;
}

/// Decoded response body. Either field may be missing or hold any JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerPayload {
    pub answer: Option<Value>,
    pub response: Option<Value>,
}

impl AnswerPayload {
    /// Pick the fields out of a decoded body. Anything that isn't an object
    /// yields an empty payload.
    pub fn from_value(value: &Value) -> Self {
        Self {
            answer: value.get("answer").cloned(),
            response: value.get("response").cloned(),
        }
    }

    /// `answer`, else `response`, else [`NO_ANSWER`].
    ///
    /// A field only counts when it is truthy: an empty string, `0`, `false`
    /// or `null` falls through to the next choice.
    pub fn into_text(self) -> String {
        [self.answer, self.response]
            .into_iter()
            .flatten()
            .find(is_truthy)
            .map(display_value)
            .unwrap_or_else(|| NO_ANSWER.to_string())
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text a browser would show for the value: arrays join their elements with
/// commas, objects collapse to `[object Object]`.
fn display_value(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        // whole floats print without the trailing ".0"
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Turn a raw reply into the answer text to display.
pub fn decode_answer(reply: HttpReply) -> Result<String, AskError> {
    if !reply.is_success() {
        return Err(AskError::Status(reply.status));
    }

    let body: Value = serde_json::from_str(&reply.body)?;
    Ok(AnswerPayload::from_value(&body).into_text())
}

/// HTTP client for the answering endpoint
#[derive(Clone)]
pub struct AskClient {
    client: Client,
    endpoint: String,
}

impl AskClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Ask a question and return the answer text to display.
    pub async fn ask(&self, question: &str) -> Result<String, AskError> {
        let reply = self.post(&AskRequest::new(question)).await?;
        decode_answer(reply)
    }
}

#[async_trait]
impl Transport for AskClient {
    async fn post(&self, request: &AskRequest) -> Result<HttpReply, AskError> {
        // .json() sets Content-Type: application/json
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(HttpReply::new(status.as_u16(), String::new()));
        }

        let body = response.text().await?;
        Ok(HttpReply::new(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> Result<String, AskError> {
        decode_answer(HttpReply::new(200, body))
    }

    #[test]
    fn test_answer_field() {
        assert_eq!(ok(r#"{"answer": "A"}"#).unwrap(), "A");
    }

    #[test]
    fn test_response_field_when_answer_missing() {
        assert_eq!(ok(r#"{"response": "B"}"#).unwrap(), "B");
    }

    #[test]
    fn test_answer_wins_over_response() {
        assert_eq!(ok(r#"{"answer": "A", "response": "B"}"#).unwrap(), "A");
    }

    #[test]
    fn test_empty_object_falls_back() {
        assert_eq!(ok("{}").unwrap(), NO_ANSWER);
    }

    #[test]
    fn test_falsy_answer_falls_through() {
        assert_eq!(ok(r#"{"answer": "", "response": "B"}"#).unwrap(), "B");
        assert_eq!(ok(r#"{"answer": 0}"#).unwrap(), NO_ANSWER);
        assert_eq!(ok(r#"{"answer": null, "response": false}"#).unwrap(), NO_ANSWER);
    }

    #[test]
    fn test_non_string_answer_is_shown_as_text() {
        assert_eq!(ok(r#"{"answer": 42}"#).unwrap(), "42");
        assert_eq!(ok(r#"{"answer": 2.0}"#).unwrap(), "2");
        assert_eq!(ok(r#"{"answer": 1.5}"#).unwrap(), "1.5");
        assert_eq!(ok(r#"{"answer": true}"#).unwrap(), "true");
    }

    #[test]
    fn test_array_and_object_answers() {
        assert_eq!(ok(r#"{"answer": ["a", "b"]}"#).unwrap(), "a,b");
        assert_eq!(ok(r#"{"answer": [1, null, ["x", 2]]}"#).unwrap(), "1,,x,2");
        assert_eq!(ok(r#"{"answer": []}"#).unwrap(), "");
        assert_eq!(ok(r#"{"answer": {"k": 1}}"#).unwrap(), "[object Object]");
        assert_eq!(ok(r#"{"response": [{"k": 1}]}"#).unwrap(), "[object Object]");
    }

    #[test]
    fn test_unexpected_shapes_fall_back() {
        assert_eq!(ok(r#"["answer", "response"]"#).unwrap(), NO_ANSWER);
        assert_eq!(ok(r#""just a string""#).unwrap(), NO_ANSWER);
        assert_eq!(ok("null").unwrap(), NO_ANSWER);
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        assert!(matches!(ok("<html>oops</html>"), Err(AskError::Decode(_))));
        assert!(matches!(ok(""), Err(AskError::Decode(_))));
    }

    #[test]
    fn test_non_success_status() {
        let err = decode_answer(HttpReply::new(500, "")).unwrap_err();
        assert_eq!(err, AskError::Status(500));
        assert!(err.to_string().contains("status: 500"));
    }

    #[test]
    fn test_redirect_status_is_not_success() {
        assert!(!HttpReply::new(304, "").is_success());
        assert!(HttpReply::new(204, "").is_success());
    }

    #[test]
    fn test_request_body_shape() {
        let json = serde_json::to_string(&AskRequest::new("Hello")).unwrap();
        assert_eq!(json, r#"{"question":"Hello"}"#);
    }
}
