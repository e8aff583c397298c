//! Page visit tracking
//!
//! Emits a `page_visit` envelope when a page is entered and a matching
//! `page_visit_end` envelope (with dwell time) when it is left or hidden.
//! Visit capture is best-effort: a dispatch failure is queued by the
//! dispatcher's fallback path and logged here, never surfaced to the host.
//! The closing dispatch on teardown is accepted as lossy; the host runtime
//! gives no guarantee it completes.

use crate::dispatcher::Dispatcher;
use crate::envelope::{EventPayload, PageVisitPayload};

/// Fixed path → page-name lookup used for visit payloads
pub fn page_name_for(path: &str) -> String {
    match path {
        "/" => "home",
        "/packages" => "test_packages",
        "/bonuses" => "bonuses",
        "/thank-you" => "thank_you",
        "/data-export" => "data_export",
        other => return other.trim_start_matches('/').to_string(),
    }
    .to_string()
}

struct ActiveVisit {
    payload: PageVisitPayload,
    started_at: i64,
}

/// Observes page lifecycle and emits start/end visit envelopes.
///
/// The tracker holds at most one active visit; entering a page closes out
/// the previous one first.
pub struct PageVisitTracker {
    current: Option<ActiveVisit>,
}

impl Default for PageVisitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PageVisitTracker {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn has_active_visit(&self) -> bool {
        self.current.is_some()
    }

    /// Record entry to a page, closing out any previous visit.
    pub async fn page_entered(&mut self, dispatcher: &Dispatcher, path: &str) {
        self.page_left(dispatcher).await;

        let envelope = dispatcher.builder().page_visit(&page_name_for(path));
        let payload = match &envelope.payload {
            EventPayload::PageVisit(visit) => visit.clone(),
            // builder().page_visit always yields a PageVisit payload
            _ => return,
        };
        let started_at = envelope.timestamp;

        if let Err(e) = dispatcher.dispatch(envelope).await {
            tracing::warn!(error = %e, "Page visit capture failed, queued for replay");
        }

        self.current = Some(ActiveVisit {
            payload,
            started_at,
        });
    }

    /// Close out the active visit, reporting dwell time.
    pub async fn page_left(&mut self, dispatcher: &Dispatcher) {
        let Some(visit) = self.current.take() else {
            return;
        };

        let envelope = dispatcher.builder().page_visit_end(
            visit.payload,
            envelope_dwell(dispatcher, visit.started_at),
        );
        if let Err(e) = dispatcher.dispatch(envelope).await {
            tracing::warn!(error = %e, "Page visit end capture failed, queued for replay");
        }
    }

    /// Visibility transition: hiding ends the visit, showing restarts it.
    pub async fn visibility_changed(&mut self, dispatcher: &Dispatcher, hidden: bool, path: &str) {
        if hidden {
            self.page_left(dispatcher).await;
        } else {
            self.page_entered(dispatcher, path).await;
        }
    }
}

fn envelope_dwell(dispatcher: &Dispatcher, started_at: i64) -> i64 {
    let now = dispatcher.builder().now_ms();
    (now - started_at).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryPolicy;
    use crate::context::CaptureContext;
    use crate::sinks::{Sink, SinkAttempt};
    use crate::store::FallbackStore;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct TestContext;

    impl CaptureContext for TestContext {
        fn current_url(&self) -> String {
            "https://example.com/packages".to_string()
        }

        fn referrer(&self) -> String {
            "https://google.com".to_string()
        }

        fn user_agent(&self) -> String {
            "test-agent".to_string()
        }

        fn now_ms(&self) -> i64 {
            1_700_000_000_000
        }

        fn new_id(&self) -> String {
            "visit-id".to_string()
        }
    }

    struct RecordingSink {
        envelopes: Arc<Mutex<Vec<crate::envelope::Envelope>>>,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn attempt(&self, envelope: &crate::envelope::Envelope) -> SinkAttempt {
            self.envelopes.lock().unwrap().push(envelope.clone());
            Ok(serde_json::Value::Null)
        }
    }

    fn dispatcher(dir: &TempDir) -> (Dispatcher, Arc<Mutex<Vec<crate::envelope::Envelope>>>) {
        let envelopes = Arc::new(Mutex::new(Vec::new()));
        let sinks: Vec<Box<dyn Sink>> = vec![Box::new(RecordingSink {
            envelopes: Arc::clone(&envelopes),
        })];
        let store = FallbackStore::new(dir.path().join("fallback.jsonl"));
        (
            Dispatcher::new(Arc::new(TestContext), sinks, store, DeliveryPolicy::FirstSuccess),
            envelopes,
        )
    }

    #[test]
    fn test_page_name_lookup() {
        assert_eq!(page_name_for("/"), "home");
        assert_eq!(page_name_for("/packages"), "test_packages");
        assert_eq!(page_name_for("/thank-you"), "thank_you");
        assert_eq!(page_name_for("/pricing"), "pricing");
    }

    #[tokio::test]
    async fn test_visit_start_and_end_envelopes() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, envelopes) = dispatcher(&dir);
        let mut tracker = PageVisitTracker::new();

        tracker.page_entered(&dispatcher, "/packages").await;
        tracker.page_left(&dispatcher).await;

        let captured = envelopes.lock().unwrap();
        assert_eq!(captured.len(), 2);
        match &captured[0].payload {
            EventPayload::PageVisit(visit) => {
                assert_eq!(visit.page, "test_packages");
                assert_eq!(visit.referrer, "https://google.com");
                assert!(visit.time_spent.is_none());
            }
            other => panic!("expected page_visit, got {other:?}"),
        }
        match &captured[1].payload {
            EventPayload::PageVisitEnd(visit) => {
                assert_eq!(visit.page, "test_packages");
                assert_eq!(visit.time_spent, Some(0));
            }
            other => panic!("expected page_visit_end, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_entering_new_page_closes_previous_visit() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, envelopes) = dispatcher(&dir);
        let mut tracker = PageVisitTracker::new();

        tracker.page_entered(&dispatcher, "/").await;
        tracker.page_entered(&dispatcher, "/bonuses").await;

        let captured = envelopes.lock().unwrap();
        let kinds: Vec<&str> = captured.iter().map(|e| e.payload.kind()).collect();
        assert_eq!(kinds, vec!["page_visit", "page_visit_end", "page_visit"]);
    }

    #[tokio::test]
    async fn test_page_left_without_visit_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, envelopes) = dispatcher(&dir);
        let mut tracker = PageVisitTracker::new();

        tracker.page_left(&dispatcher).await;
        assert!(envelopes.lock().unwrap().is_empty());
    }
}
