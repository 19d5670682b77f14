//! HTTP recognition service client
//!
//! POSTs `{task, instructions, image_url | text, model}` as JSON to a single
//! endpoint and returns the answer text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::services::{RecognitionInput, RecognitionService, RecognitionTask, ServiceError};

const SERVICE_NAME: &str = "recognition";
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Ceiling for fallback calls, which carry no first-attempt bound of their own
const REQUEST_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Serialize)]
struct RecognitionRequest<'a> {
    task: &'a str,
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

pub struct HttpRecognitionService {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl HttpRecognitionService {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
        })
    }
}

/// Services that wrap their answer as `{"output": "..."}` or
/// `{"content": "..."}` are unwrapped; anything else passes through.
pub fn unwrap_envelope(body: String) -> String {
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(obj)) => ["output", "content", "result"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body),
        _ => body,
    }
}

#[async_trait]
impl RecognitionService for HttpRecognitionService {
    async fn recognize(
        &self,
        input: RecognitionInput,
        task: RecognitionTask,
    ) -> Result<String, ServiceError> {
        let (image_url, text) = match &input {
            RecognitionInput::ImageUrl(url) => (Some(url.as_str()), None),
            RecognitionInput::Text(text) => (None, Some(text.as_str())),
        };
        let request = RecognitionRequest {
            task: task.as_str(),
            instructions: task.instructions(),
            image_url,
            text,
            model: self.model.as_deref(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(task = task.as_str(), endpoint = %self.endpoint, "sending recognition request");
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status {
                service: SERVICE_NAME,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(unwrap_envelope(body))
    }
}

/// Stand-in used when no recognition endpoint is configured
pub struct UnconfiguredRecognition;

#[async_trait]
impl RecognitionService for UnconfiguredRecognition {
    async fn recognize(
        &self,
        _input: RecognitionInput,
        task: RecognitionTask,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::Unavailable(format!(
            "no recognition endpoint configured for {}",
            task.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_unwrapped() {
        let body = r#"{"output": "{\"title\": \"Apple\"}"}"#.to_string();
        assert_eq!(unwrap_envelope(body), r#"{"title": "Apple"}"#);
    }

    #[test]
    fn test_plain_body_passes_through() {
        let body = r#"{"title": "Apple", "calories": 95}"#.to_string();
        assert_eq!(unwrap_envelope(body.clone()), body);
        assert_eq!(unwrap_envelope("not json".into()), "not json");
    }

    #[test]
    fn test_request_shape() {
        let request = RecognitionRequest {
            task: RecognitionTask::IconSelection.as_str(),
            instructions: "pick",
            image_url: None,
            text: Some("banana"),
            model: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["task"], "icon_selection");
        assert_eq!(json["text"], "banana");
        assert!(json.get("image_url").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_service_fails_softly() {
        let result = UnconfiguredRecognition
            .recognize(RecognitionInput::Text("x".into()), RecognitionTask::IconSelection)
            .await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
    }
}
