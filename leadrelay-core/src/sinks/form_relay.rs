//! Form-relay sinks: Formspree and Netlify Forms
//!
//! Both relays were built for HTML form submissions. Formspree accepts a JSON
//! body; Netlify Forms wants multipart form fields, so the envelope travels
//! as a JSON string under a `data` field next to the registered `form-name`.

use async_trait::async_trait;
use reqwest::multipart;

use crate::config::EndpointConfig;
use crate::envelope::Envelope;

use super::{normalize_response, Sink, SinkAttempt, SinkError};

/// Name the data-capture form is registered under at Netlify
const NETLIFY_FORM_NAME: &str = "data-capture";

pub struct FormspreeSink {
    client: reqwest::Client,
    config: Option<EndpointConfig>,
}

impl FormspreeSink {
    pub fn new(client: reqwest::Client, config: Option<EndpointConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Sink for FormspreeSink {
    fn name(&self) -> &'static str {
        "formspree"
    }

    async fn attempt(&self, envelope: &Envelope) -> SinkAttempt {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| SinkError::not_configured("Formspree URL"))?;

        let response = self
            .client
            .post(&config.url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| SinkError::new(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::new(format!("Formspree failed: {status}")));
        }

        Ok(normalize_response(response, envelope).await)
    }
}

pub struct NetlifyFormsSink {
    client: reqwest::Client,
    config: Option<EndpointConfig>,
}

impl NetlifyFormsSink {
    pub fn new(client: reqwest::Client, config: Option<EndpointConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Sink for NetlifyFormsSink {
    fn name(&self) -> &'static str {
        "netlify_forms"
    }

    async fn attempt(&self, envelope: &Envelope) -> SinkAttempt {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| SinkError::not_configured("Netlify form URL"))?;

        let body = serde_json::to_string(envelope)
            .map_err(|e| SinkError::new(format!("failed to encode envelope: {e}")))?;

        let form = multipart::Form::new()
            .text("form-name", NETLIFY_FORM_NAME)
            .text("data", body);

        let response = self
            .client
            .post(&config.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SinkError::new(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::new(format!("Netlify Forms failed: {status}")));
        }

        Ok(normalize_response(response, envelope).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventPayload;

    fn envelope() -> Envelope {
        Envelope {
            payload: EventPayload::Unknown {
                kind: "x".to_string(),
                data: serde_json::Value::Null,
            },
            timestamp: 0,
            session_id: "s".to_string(),
            url: String::new(),
            user_agent: String::new(),
        }
    }

    #[tokio::test]
    async fn test_formspree_unconfigured_message() {
        let sink = FormspreeSink::new(reqwest::Client::new(), None);
        let err = sink.attempt(&envelope()).await.unwrap_err();
        assert_eq!(err.to_string(), "No Formspree URL configured");
    }

    #[tokio::test]
    async fn test_netlify_unconfigured_message() {
        let sink = NetlifyFormsSink::new(reqwest::Client::new(), None);
        let err = sink.attempt(&envelope()).await.unwrap_err();
        assert_eq!(err.to_string(), "No Netlify form URL configured");
    }
}
