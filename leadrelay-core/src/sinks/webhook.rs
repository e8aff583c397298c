//! Generic webhook sink
//!
//! Posts the envelope as a JSON body; any non-success transport status is a
//! failure. No assumptions about the receiver beyond accepting JSON.

use async_trait::async_trait;

use crate::config::EndpointConfig;
use crate::envelope::Envelope;

use super::{normalize_response, Sink, SinkAttempt, SinkError};

pub struct WebhookSink {
    client: reqwest::Client,
    config: Option<EndpointConfig>,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, config: Option<EndpointConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn attempt(&self, envelope: &Envelope) -> SinkAttempt {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| SinkError::not_configured("webhook URL"))?;

        let response = self
            .client
            .post(&config.url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| SinkError::new(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::new(format!("Webhook failed: {status}")));
        }

        Ok(normalize_response(response, envelope).await)
    }
}
