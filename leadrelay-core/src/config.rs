//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/leadrelay/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/leadrelay/` (~/.config/leadrelay/)
//! - Data: `$XDG_DATA_HOME/leadrelay/` (~/.local/share/leadrelay/)
//! - State/Logs: `$XDG_STATE_HOME/leadrelay/` (~/.local/state/leadrelay/)
//!
//! Each sink section is optional; leaving one out disables exactly that
//! adapter without affecting the others.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Site identity stamped on envelopes
    #[serde(default)]
    pub site: SiteConfig,

    /// Dispatch behavior
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Sink endpoints and credentials
    #[serde(default)]
    pub sinks: SinksConfig,

    /// Local fallback store
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ambient site identity used by the default host context
#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// URL reported on captured envelopes
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User agent reported on captured envelopes
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://localhost".to_string()
}

fn default_user_agent() -> String {
    format!("leadrelay/{}", env!("CARGO_PKG_VERSION"))
}

/// How the dispatcher treats the ordered sink chain
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Stop at the first sink that accepts the envelope
    #[default]
    FirstSuccess,
    /// Attempt every configured sink; succeed if at least one accepted
    Broadcast,
}

/// Dispatch behavior configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Sink chain policy
    #[serde(default)]
    pub policy: DeliveryPolicy,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            policy: DeliveryPolicy::default(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// One optional section per adapter
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SinksConfig {
    /// Primary structured-storage sink (PostgREST-style API)
    pub database: Option<DatabaseSinkConfig>,
    /// Spreadsheet relay (Apps Script web app)
    pub sheets: Option<EndpointConfig>,
    /// Generic webhook
    pub webhook: Option<EndpointConfig>,
    /// Formspree form relay
    pub formspree: Option<EndpointConfig>,
    /// Netlify Forms relay
    pub netlify: Option<EndpointConfig>,
}

impl SinksConfig {
    /// True if at least one sink has a usable endpoint
    pub fn any_configured(&self) -> bool {
        self.database.is_some()
            || self.sheets.is_some()
            || self.webhook.is_some()
            || self.formspree.is_some()
            || self.netlify.is_some()
    }
}

/// Endpoint-only sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    pub url: String,
}

/// Structured-storage sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSinkConfig {
    /// Service base URL (rows are posted to `{url}/rest/v1/{table}`)
    pub url: String,
    /// Anonymous API key sent as `apikey` and bearer token
    pub api_key: String,
}

/// Local fallback store configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FallbackConfig {
    /// Override path for the fallback log; defaults to the XDG data dir
    pub path: Option<PathBuf>,
}

impl FallbackConfig {
    /// Resolved path of the fallback log
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(Config::default_fallback_path)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Echo log lines to stderr in addition to the rolling file
    #[serde(default)]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.delivery.timeout_secs == 0 {
            return Err(Error::Config(
                "delivery.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(db) = &self.sinks.database {
            if db.url.is_empty() {
                return Err(Error::Config(
                    "sinks.database.url must not be empty".to_string(),
                ));
            }
            if db.api_key.is_empty() {
                return Err(Error::Config(
                    "sinks.database.api_key must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/leadrelay/config.toml` (~/.config/leadrelay/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("leadrelay").join("config.toml")
    }

    /// Returns the data directory path (for the fallback log)
    ///
    /// `$XDG_DATA_HOME/leadrelay/` (~/.local/share/leadrelay/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("leadrelay")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/leadrelay/` (~/.local/state/leadrelay/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("leadrelay")
    }

    /// Returns the default fallback log path
    ///
    /// `$XDG_DATA_HOME/leadrelay/fallback.jsonl`
    pub fn default_fallback_path() -> PathBuf {
        Self::data_dir().join("fallback.jsonl")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/leadrelay/leadrelay.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("leadrelay.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.delivery.policy, DeliveryPolicy::FirstSuccess);
        assert_eq!(config.delivery.timeout_secs, 30);
        assert!(!config.sinks.any_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[site]
base_url = "https://prep.example.com"

[delivery]
policy = "broadcast"
timeout_secs = 10

[sinks.database]
url = "https://db.example.com"
api_key = "anon-key"

[sinks.webhook]
url = "https://hooks.example.com/capture"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.site.base_url, "https://prep.example.com");
        assert_eq!(config.delivery.policy, DeliveryPolicy::Broadcast);
        assert_eq!(config.delivery.timeout_secs, 10);
        assert_eq!(
            config.sinks.database.as_ref().map(|d| d.url.as_str()),
            Some("https://db.example.com")
        );
        assert!(config.sinks.webhook.is_some());
        assert!(config.sinks.sheets.is_none());
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sink_section_disables_adapter() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.sinks.database.is_none());
        assert!(config.sinks.netlify.is_none());
        assert!(!config.sinks.any_configured());
    }

    #[test]
    fn test_validation_rejects_empty_database_credentials() {
        let toml = r#"
[sinks.database]
url = "https://db.example.com"
api_key = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = r#"
[delivery]
timeout_secs = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
