//! Process-lifetime session identity
//!
//! A session id is generated once at dispatcher construction and stamped on
//! every envelope, letting the sinks correlate events from one visit.

use crate::context::CaptureContext;

/// Length of the random suffix appended to the time component
const SUFFIX_LEN: usize = 9;

/// Generate a session identifier from the context's clock and id generator.
///
/// Format: `session_<epoch-ms>_<random-suffix>`. The time component keeps
/// ids sortable, the suffix avoids collisions between concurrent sessions.
pub fn generate_session_id(ctx: &dyn CaptureContext) -> String {
    let raw = ctx.new_id().replace('-', "");
    let suffix: String = raw.chars().take(SUFFIX_LEN).collect();
    format!("session_{}_{}", ctx.now_ms(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HostContext;

    #[test]
    fn test_session_id_shape() {
        let ctx = HostContext::new("https://example.com", "test-agent");
        let id = generate_session_id(&ctx);
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
    }

    #[test]
    fn test_session_ids_differ() {
        let ctx = HostContext::new("https://example.com", "test-agent");
        assert_ne!(generate_session_id(&ctx), generate_session_id(&ctx));
    }
}
