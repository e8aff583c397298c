//! Spreadsheet relay sink (Apps Script web app)
//!
//! The relay accepts the envelope JSON as a `text/plain` body so the hosted
//! script receives the POST without a CORS preflight. The script always
//! answers 200 with a JSON body; an in-body `status: "error"` indicator is a
//! failure even when the transport status is a success.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::config::EndpointConfig;
use crate::envelope::Envelope;

use super::{Sink, SinkAttempt, SinkError};

pub struct GoogleSheetsSink {
    client: reqwest::Client,
    config: Option<EndpointConfig>,
}

impl GoogleSheetsSink {
    pub fn new(client: reqwest::Client, config: Option<EndpointConfig>) -> Self {
        Self { client, config }
    }

    /// Pull a human-readable message out of the relay's response body
    fn error_message(parsed: Option<&serde_json::Value>, text: &str) -> String {
        parsed
            .and_then(|v| v.get("message").or_else(|| v.get("error")))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                if text.is_empty() {
                    "unknown".to_string()
                } else {
                    text.to_string()
                }
            })
    }
}

#[async_trait]
impl Sink for GoogleSheetsSink {
    fn name(&self) -> &'static str {
        "google_sheets"
    }

    async fn attempt(&self, envelope: &Envelope) -> SinkAttempt {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| SinkError::not_configured("Google Sheets URL"))?;

        let body = serde_json::to_string(envelope)
            .map_err(|e| SinkError::new(format!("failed to encode envelope: {e}")))?;

        let response = self
            .client
            .post(&config.url)
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::new(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<serde_json::Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(SinkError::new(format!(
                "Google Sheets failed: {} - {}",
                status,
                Self::error_message(parsed.as_ref(), &text)
            )));
        }

        if parsed
            .as_ref()
            .and_then(|v| v.get("status"))
            .and_then(|v| v.as_str())
            == Some("error")
        {
            return Err(SinkError::new(format!(
                "Google Sheets reported error: {}",
                Self::error_message(parsed.as_ref(), &text)
            )));
        }

        if let Some(json) = parsed {
            return Ok(json);
        }
        if !text.is_empty() {
            return Ok(serde_json::Value::String(text));
        }
        Ok(serde_json::to_value(envelope).unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventPayload;

    #[tokio::test]
    async fn test_unconfigured_fails_without_io() {
        let sink = GoogleSheetsSink::new(reqwest::Client::new(), None);
        let envelope = Envelope {
            payload: EventPayload::Unknown {
                kind: "x".to_string(),
                data: serde_json::Value::Null,
            },
            timestamp: 0,
            session_id: "s".to_string(),
            url: String::new(),
            user_agent: String::new(),
        };
        let err = sink.attempt(&envelope).await.unwrap_err();
        assert_eq!(err.to_string(), "No Google Sheets URL configured");
    }

    #[test]
    fn test_error_message_prefers_body_message() {
        let parsed = serde_json::json!({"status": "error", "message": "sheet missing"});
        assert_eq!(
            GoogleSheetsSink::error_message(Some(&parsed), "raw"),
            "sheet missing"
        );
        assert_eq!(GoogleSheetsSink::error_message(None, "raw"), "raw");
        assert_eq!(GoogleSheetsSink::error_message(None, ""), "unknown");
    }
}
