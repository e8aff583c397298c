//! Capture dispatcher: ordered sink attempts with durable fallback
//!
//! Given an envelope, the dispatcher guarantees one of two terminal
//! outcomes: at least one sink accepted it (the normalized result is
//! returned), or no sink accepted it (the envelope is persisted to the local
//! fallback store and a [`DispatchError`] is raised). Individual sink
//! failures are never surfaced to callers; only total failure propagates.
//!
//! Sinks are tried strictly in configured order. Under the default
//! [`DeliveryPolicy::FirstSuccess`] the chain stops at the first acceptance,
//! so operators can put a preferred sink first without paying for the rest.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DeliveryPolicy};
use crate::context::{CaptureContext, HostContext};
use crate::envelope::{Envelope, EnvelopeBuilder, LeadForm};
use crate::error::{Error, Result};
use crate::replay::{ReplayCoordinator, ReplayReport};
use crate::session::generate_session_id;
use crate::sinks::{
    DatabaseSink, FormspreeSink, GoogleSheetsSink, NetlifyFormsSink, Sink, WebhookSink,
};
use crate::store::{FallbackRecord, FallbackStore};

/// One adapter's failure within a dispatch, in attempt order
#[derive(Debug, Clone, serde::Serialize)]
pub struct SinkFailure {
    pub service: String,
    pub message: String,
}

/// Raised only when every configured sink rejected an envelope.
///
/// `errors` and `services_attempted` have equal length and share attempt
/// order. The envelope itself has already been persisted to the fallback
/// store by the time this error reaches the caller.
#[derive(Debug, Clone)]
pub struct DispatchError {
    /// Envelope type ("lead", "analytics_event", ...)
    pub kind: String,
    /// Source field of the payload, when it carries one
    pub source: Option<String>,
    /// Adapter names in attempt order
    pub services_attempted: Vec<String>,
    /// Failure reason per attempted adapter
    pub errors: Vec<SinkFailure>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data capture failed for {}", self.kind)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        let reasons: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.service, e.message))
            .collect();
        write!(f, ": {}", reasons.join("; "))
    }
}

impl std::error::Error for DispatchError {}

/// The capture dispatcher.
///
/// Constructed explicitly with its sink chain and storage handle; the
/// application's composition root owns its lifecycle. Concurrent capture
/// calls are independent; the append-only fallback log is the only shared
/// mutable state.
pub struct Dispatcher {
    context: Arc<dyn CaptureContext>,
    session_id: String,
    builder: EnvelopeBuilder,
    sinks: Vec<Box<dyn Sink>>,
    store: FallbackStore,
    policy: DeliveryPolicy,
}

impl Dispatcher {
    pub fn new(
        context: Arc<dyn CaptureContext>,
        sinks: Vec<Box<dyn Sink>>,
        store: FallbackStore,
        policy: DeliveryPolicy,
    ) -> Self {
        let session_id = generate_session_id(context.as_ref());
        let builder = EnvelopeBuilder::new(Arc::clone(&context), session_id.clone());
        Self {
            context,
            session_id,
            builder,
            sinks,
            store,
            policy,
        }
    }

    /// Build a dispatcher with the default ordered sink chain:
    /// database, google_sheets, webhook, formspree, netlify_forms.
    ///
    /// Unconfigured sinks stay in the chain and fail fast with their
    /// "not configured" reason, keeping diagnostics complete.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.delivery.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        let sinks: Vec<Box<dyn Sink>> = vec![
            Box::new(DatabaseSink::new(
                client.clone(),
                config.sinks.database.clone(),
            )),
            Box::new(GoogleSheetsSink::new(
                client.clone(),
                config.sinks.sheets.clone(),
            )),
            Box::new(WebhookSink::new(
                client.clone(),
                config.sinks.webhook.clone(),
            )),
            Box::new(FormspreeSink::new(
                client.clone(),
                config.sinks.formspree.clone(),
            )),
            Box::new(NetlifyFormsSink::new(client, config.sinks.netlify.clone())),
        ];

        let context = Arc::new(HostContext::new(
            config.site.base_url.clone(),
            config.site.user_agent.clone(),
        ));
        let store = FallbackStore::new(config.fallback.resolved_path());

        Ok(Self::new(context, sinks, store, config.delivery.policy))
    }

    /// Session identifier stamped on every envelope from this dispatcher
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn builder(&self) -> &EnvelopeBuilder {
        &self.builder
    }

    pub fn store(&self) -> &FallbackStore {
        &self.store
    }

    /// Capture a lead submission. The success value is the accepting sink's
    /// normalized response; when the database sink answered, it carries the
    /// storage-assigned id.
    pub async fn capture_lead(
        &self,
        form: LeadForm,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        self.dispatch(self.builder.lead(form)).await
    }

    pub async fn capture_bonus_signup(
        &self,
        email: &str,
        source: Option<&str>,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        self.dispatch(self.builder.bonus_signup(email, source)).await
    }

    /// Capture an analytics event. Callers should treat failures as
    /// non-fatal; analytics must never break the user experience.
    pub async fn capture_analytics_event(
        &self,
        event_name: &str,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        self.dispatch(self.builder.analytics_event(event_name, properties))
            .await
    }

    /// Capture an event of a type outside the known set; the payload is
    /// forwarded opaquely.
    pub async fn capture_raw(
        &self,
        kind: &str,
        data: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        self.dispatch(self.builder.raw(kind, data)).await
    }

    /// Dispatch one envelope through the sink chain, persisting it to the
    /// fallback store on total failure.
    pub async fn dispatch(
        &self,
        envelope: Envelope,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        match self.deliver(&envelope).await {
            Ok(value) => Ok(value),
            Err(error) => {
                // A persistence failure is logged but does not change the
                // outcome; the DispatchError is raised either way.
                if let Err(store_err) = self.store.append(&envelope, self.context.now_ms()) {
                    tracing::error!(
                        kind = %envelope.payload.kind(),
                        error = %store_err,
                        "Failed to persist undelivered envelope to fallback store"
                    );
                } else {
                    tracing::warn!(
                        kind = %envelope.payload.kind(),
                        "All sinks failed, envelope stored locally as fallback"
                    );
                }
                Err(error)
            }
        }
    }

    /// Try the sink chain without touching the fallback store. Used by
    /// dispatch and by replay (which must not re-append what it reads).
    pub(crate) async fn deliver(
        &self,
        envelope: &Envelope,
    ) -> std::result::Result<serde_json::Value, DispatchError> {
        let mut services_attempted = Vec::new();
        let mut errors = Vec::new();
        let mut delivered: Option<serde_json::Value> = None;

        for sink in &self.sinks {
            services_attempted.push(sink.name().to_string());
            match sink.attempt(envelope).await {
                Ok(value) => {
                    tracing::debug!(
                        sink = sink.name(),
                        kind = %envelope.payload.kind(),
                        "Sink accepted envelope"
                    );
                    if delivered.is_none() {
                        delivered = Some(value);
                    }
                    if self.policy == DeliveryPolicy::FirstSuccess {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        sink = sink.name(),
                        kind = %envelope.payload.kind(),
                        error = %e,
                        "Sink rejected envelope"
                    );
                    errors.push(SinkFailure {
                        service: sink.name().to_string(),
                        message: e.message,
                    });
                }
            }
        }

        match delivered {
            Some(value) => Ok(value),
            None => Err(DispatchError {
                kind: envelope.payload.kind().to_string(),
                source: envelope.payload.source(),
                services_attempted,
                errors,
            }),
        }
    }

    /// Read-only view of the persisted fallback envelopes, for diagnostics
    /// and export UIs.
    pub fn fallback_data(&self) -> Result<Vec<FallbackRecord>> {
        self.store.list()
    }

    /// Run one replay pass over the fallback store; records that fail again
    /// are retained.
    pub async fn retry_failed_submissions(&self) -> Result<ReplayReport> {
        ReplayCoordinator::new(self).retry_all().await
    }
}
