//! Sink adapters: one external delivery channel per adapter
//!
//! Every adapter wraps one remote transport with its own request shape and
//! success criteria behind the uniform [`Sink`] contract. Adapters validate
//! their own configuration (an unconfigured adapter fails fast with a
//! `"No <sink> configured"` reason, without network I/O), issue exactly one
//! outbound request per attempt, and never retry internally; retry belongs to
//! the dispatcher and the replay coordinator.

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::Envelope;

mod database;
mod form_relay;
mod sheets;
mod webhook;

pub use database::DatabaseSink;
pub use form_relay::{FormspreeSink, NetlifyFormsSink};
pub use sheets::GoogleSheetsSink;
pub use webhook::WebhookSink;

/// Failure of a single sink attempt.
///
/// Carries a human-readable reason only; configuration failures and
/// transport failures are treated identically for dispatch purposes and
/// distinguished by message text for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Reason reported by an adapter that has no usable endpoint
    pub fn not_configured(what: &str) -> Self {
        Self::new(format!("No {what} configured"))
    }
}

/// Result of one sink attempt; the success value is the sink's normalized
/// response body.
pub type SinkAttempt = Result<serde_json::Value, SinkError>;

/// One external delivery channel for envelopes.
///
/// Implementations must be side-effect free on failure: a failed attempt
/// leaves no partial state behind that a later sink in the chain could
/// observe.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stable adapter name used in dispatch diagnostics
    fn name(&self) -> &'static str;

    /// Deliver one envelope; exactly one outbound request per call
    async fn attempt(&self, envelope: &Envelope) -> SinkAttempt;
}

/// Normalize a successful response body into a plain JSON value.
///
/// Falls back from parsed JSON to raw text to the original envelope, so the
/// dispatcher returns a consistent success value regardless of which sink
/// answered.
pub(crate) async fn normalize_response(
    response: reqwest::Response,
    envelope: &Envelope,
) -> serde_json::Value {
    let text = response.text().await.unwrap_or_default();
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
        return json;
    }
    if !text.is_empty() {
        return serde_json::Value::String(text);
    }
    serde_json::to_value(envelope).unwrap_or(serde_json::Value::Null)
}
