//! Host environment context for the capture pipeline
//!
//! Ambient host facts (page URL, user agent, clock, id generation) are
//! injected through [`CaptureContext`] rather than read from globals, so the
//! dispatcher and envelope builder are testable with a fixed clock and
//! deterministic ids.

use chrono::Utc;
use uuid::Uuid;

/// Ambient capabilities read at capture time.
///
/// Implementations must be cheap to call; every envelope build reads the
/// URL, user agent, and clock at the moment of capture.
pub trait CaptureContext: Send + Sync {
    /// URL of the page/view the event was captured on
    fn current_url(&self) -> String;

    /// Referrer for page-visit events
    fn referrer(&self) -> String {
        String::new()
    }

    /// User agent string of the capturing client
    fn user_agent(&self) -> String;

    /// Current time in epoch milliseconds
    fn now_ms(&self) -> i64;

    /// Fresh unique identifier for generated records
    fn new_id(&self) -> String;
}

/// Production context backed by the system clock and UUID v4 ids.
///
/// URL and user agent are fixed at construction from configuration; an
/// embedding application that tracks navigation can supply its own
/// [`CaptureContext`] instead.
#[derive(Debug, Clone)]
pub struct HostContext {
    base_url: String,
    user_agent: String,
    referrer: String,
}

impl HostContext {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            referrer: String::new(),
        }
    }

    /// Set the referrer reported on page-visit envelopes
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }
}

impl CaptureContext for HostContext {
    fn current_url(&self) -> String {
        self.base_url.clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_context_ids_are_unique() {
        let ctx = HostContext::new("https://example.com", "test-agent");
        assert_ne!(ctx.new_id(), ctx.new_id());
    }

    #[test]
    fn test_host_context_reports_configured_url() {
        let ctx = HostContext::new("https://example.com/packages", "test-agent");
        assert_eq!(ctx.current_url(), "https://example.com/packages");
        assert_eq!(ctx.user_agent(), "test-agent");
    }
}
