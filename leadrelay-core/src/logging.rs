//! Tracing setup for the capture pipeline
//!
//! Log output goes to a daily-rolling file under the XDG state directory
//! (`~/.local/state/leadrelay/`), with an optional stderr echo for
//! interactive CLI use. The default filter pins delivery and persistence
//! failures so they reach the log even under a quieted base level.

use crate::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Default filter directives for a base level.
///
/// HTTP client internals (`hyper`, `reqwest`) are capped at warn so debug
/// runs stay readable. When the base level is quieter than warn, sink
/// delivery failures and fallback-persistence errors are pinned back to
/// warn: an operator silencing routine output must still see that captures
/// are landing in the local fallback instead of a sink.
fn capture_filter(level: &str) -> EnvFilter {
    let mut directives = format!("{level},hyper=warn,reqwest=warn");
    if matches!(level, "error" | "off") {
        directives.push_str(",leadrelay_core::dispatcher=warn,leadrelay_core::store=warn");
    }
    EnvFilter::new(directives)
}

/// Initialize logging: rolling file in the XDG state directory, optional
/// stderr echo, filter from `RUST_LOG` or the configured base level.
///
/// Returns a guard that must be held for the life of the process; dropping
/// it flushes the non-blocking writer.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "leadrelay.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| capture_filter(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.console {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    } else {
        registry.init();
    }

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %config.level,
        console = config.console,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (captured per-test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| capture_filter("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Keeps the non-blocking log writer alive; flushes on drop.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_base_level_pins_failure_targets() {
        let filter = capture_filter("error").to_string();
        assert!(filter.contains("leadrelay_core::dispatcher=warn"));
        assert!(filter.contains("leadrelay_core::store=warn"));
    }

    #[test]
    fn test_verbose_base_level_caps_http_internals_only() {
        let filter = capture_filter("debug").to_string();
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("reqwest=warn"));
        assert!(!filter.contains("dispatcher"));
    }
}
