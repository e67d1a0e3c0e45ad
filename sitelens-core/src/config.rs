//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/sitelens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/sitelens/` (~/.config/sitelens/)
//! - Data: `$XDG_DATA_HOME/sitelens/` (~/.local/share/sitelens/)
//! - State/Logs: `$XDG_STATE_HOME/sitelens/` (~/.local/state/sitelens/)

use crate::error::{Error, Result};
use crate::session::RequestPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

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
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Analysis service endpoints
    #[serde(default)]
    pub service: ServiceConfig,

    /// Pacing and retry for pipeline requests
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Report export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analysis service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Base URL of the service hosting the `/api/*` routes
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional bearer token sent with every request
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_service_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("service.base_url must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "service.base_url must start with http:// or https:// (got {})",
                url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "service.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_service_timeout() -> u64 {
    120
}

/// Pipeline pacing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Fixed delay between Q&A requests in milliseconds
    #[serde(default = "default_question_delay")]
    pub question_delay_ms: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial backoff between retries in milliseconds (doubles per attempt)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            question_delay_ms: default_question_delay(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl PipelineConfig {
    /// Convert into the policy injected into the session manager
    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy {
            question_delay: Duration::from_millis(self.question_delay_ms),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn default_question_delay() -> u64 {
    500
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

/// Report export configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ExportConfig {
    /// Directory that receives exported documents
    pub output_dir: Option<PathBuf>,
}

impl ExportConfig {
    /// Resolve the output directory: configured, else the user's download
    /// directory, else the data directory.
    pub fn resolve_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(Config::data_dir)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.service.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/sitelens/config.toml` (~/.config/sitelens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("sitelens").join("config.toml")
    }

    /// Returns the data directory path (for the history database)
    ///
    /// `$XDG_DATA_HOME/sitelens/` (~/.local/share/sitelens/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("sitelens")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/sitelens/` (~/.local/state/sitelens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("sitelens")
    }

    /// Returns the history database path
    ///
    /// `$XDG_DATA_HOME/sitelens/history.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("history.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/sitelens/sitelens.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("sitelens.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://localhost:3000");
        assert_eq!(config.service.timeout_secs, 120);
        assert_eq!(config.pipeline.question_delay_ms, 500);
        assert_eq!(config.pipeline.max_retries, 2);
        assert!(config.export.output_dir.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[service]
base_url = "https://analyzer.example.com"
api_key = "sk_test"

[pipeline]
question_delay_ms = 250
max_retries = 0

[export]
output_dir = "/tmp/quotes"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.service.base_url, "https://analyzer.example.com");
        assert_eq!(config.service.api_key.as_deref(), Some("sk_test"));
        assert_eq!(config.service.timeout_secs, 120);
        assert_eq!(config.pipeline.question_delay_ms, 250);
        assert_eq!(config.pipeline.max_retries, 0);
        assert_eq!(
            config.export.resolve_output_dir(),
            PathBuf::from("/tmp/quotes")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_request_policy_from_config() {
        let policy = PipelineConfig::default().request_policy();
        assert_eq!(policy.question_delay, Duration::from_millis(500));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.retry_backoff, Duration::from_millis(500));
    }

    #[test]
    fn test_service_config_validation() {
        assert!(ServiceConfig::default().validate().is_ok());

        let config = ServiceConfig {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServiceConfig {
            base_url: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service]\nbase_url = \"not-a-url\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
