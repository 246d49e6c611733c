//! Configuration constants and utilities for tapline
//!
//! Defaults, environment overrides for on-disk locations, and the
//! validated runtime configuration built from command line arguments.

use reqwest::Url;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cmd_args::CommandLineArgs;

/// Default listening port (also read from the `PORT` environment variable)
pub const DEFAULT_PORT: u16 = 8090;

/// Default listening address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default upstream base URL
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:8080/v1";

/// Default number of records kept in history
pub const DEFAULT_HISTORY_SIZE: usize = 200;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Default collapse pattern file
pub const DEFAULT_PATTERNS_PATH: &str = "~/.tapline/collapse-patterns.json";

/// Environment variable name for overriding the collapse pattern file
pub const PATTERNS_PATH_ENV_VAR: &str = "TAPLINE_COLLAPSE_PATH";

/// Default diagnostic log file
pub const DEFAULT_LOG_PATH: &str = "~/.tapline/tapline.log";

/// Environment variable name for overriding the log file
pub const LOG_PATH_ENV_VAR: &str = "TAPLINE_LOG_PATH";

/// Get the collapse pattern path, checking environment variable first, then falling back to default
pub fn get_patterns_path() -> String {
    std::env::var_os(PATTERNS_PATH_ENV_VAR)
        .and_then(|val| val.into_string().ok())
        .unwrap_or_else(|| DEFAULT_PATTERNS_PATH.to_string())
}

/// Get the log file path, checking environment variable first, then falling back to default
pub fn get_log_path() -> String {
    std::env::var_os(LOG_PATH_ENV_VAR)
        .and_then(|val| val.into_string().ok())
        .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string())
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::warn!("Could not expand path '{}': {}", path, e);
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}

/// Startup configuration errors; these abort before the proxy binds
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u16),
    #[error("invalid history size {0}: must be at least 1")]
    InvalidHistorySize(usize),
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },
    #[error("unsupported upstream scheme '{scheme}' in '{url}': use http or https")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub upstream: Url,
    pub history_size: usize,
    pub patterns_path: PathBuf,
    pub collapse_case_sensitive: bool,
    pub color: bool,
    pub connect_timeout: Duration,
    pub upstream_timeout: Duration,
    pub shutdown_grace: Duration,
    pub max_body_bytes: usize,
    pub verbose: bool,
}

impl ProxyConfig {
    /// Configuration with defaults for everything but the essentials
    pub fn new(port: u16, upstream: &str, history_size: usize) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        if history_size == 0 {
            return Err(ConfigError::InvalidHistorySize(history_size));
        }

        Ok(Self {
            bind: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or(IpAddr::from([127, 0, 0, 1])),
            port,
            upstream: parse_upstream(upstream)?,
            history_size,
            patterns_path: expand_path(&get_patterns_path()),
            collapse_case_sensitive: true,
            color: false,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            verbose: false,
        })
    }

    /// Build and validate the configuration from parsed arguments
    pub fn from_args(args: &CommandLineArgs) -> Result<Self, ConfigError> {
        let mut config = Self::new(args.port(), args.upstream(), args.history_size())?;

        config.bind = args.bind();
        if let Some(path) = args.patterns_file() {
            config.patterns_path = expand_path(&path.to_string_lossy());
        }
        config.collapse_case_sensitive = !args.collapse_case_insensitive();
        config.color = !args.no_color() && atty::is(atty::Stream::Stdout);
        config.connect_timeout = Duration::from_secs(args.connect_timeout());
        config.upstream_timeout = Duration::from_secs(args.upstream_timeout());
        config.shutdown_grace = Duration::from_secs(args.shutdown_grace());
        config.max_body_bytes = args.max_body_bytes();
        config.verbose = args.verbose();

        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Upstream base URL without a trailing slash, ready for path appending
    pub fn upstream_base(&self) -> &str {
        self.upstream.as_str().trim_end_matches('/')
    }
}

fn parse_upstream(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUpstream {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ConfigError::UnsupportedScheme {
                url: url.to_string(),
                scheme: scheme.to_string(),
            })
        }
    }

    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUpstream {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_path() {
        assert_eq!(DEFAULT_PATTERNS_PATH, "~/.tapline/collapse-patterns.json");
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(PATTERNS_PATH_ENV_VAR, "TAPLINE_COLLAPSE_PATH");
        assert_eq!(LOG_PATH_ENV_VAR, "TAPLINE_LOG_PATH");
    }

    #[test]
    fn test_get_patterns_path_env_override() {
        // Save current env var state
        let original = std::env::var_os(PATTERNS_PATH_ENV_VAR);

        let test_path = "/custom/collapse/patterns.json";
        std::env::set_var(PATTERNS_PATH_ENV_VAR, test_path);
        assert_eq!(get_patterns_path(), test_path);

        std::env::remove_var(PATTERNS_PATH_ENV_VAR);
        assert_eq!(get_patterns_path(), DEFAULT_PATTERNS_PATH);

        // Restore original state
        if let Some(val) = original {
            std::env::set_var(PATTERNS_PATH_ENV_VAR, val);
        }
    }

    #[test]
    fn expand_path_should_resolve_home() {
        let expanded = expand_path("~/.tapline/x.json");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with(".tapline/x.json"));
    }

    #[test]
    fn config_should_reject_port_zero() {
        assert_eq!(
            ProxyConfig::new(0, DEFAULT_UPSTREAM_URL, 10).unwrap_err(),
            ConfigError::InvalidPort(0)
        );
    }

    #[test]
    fn config_should_reject_zero_history() {
        assert_eq!(
            ProxyConfig::new(8090, DEFAULT_UPSTREAM_URL, 0).unwrap_err(),
            ConfigError::InvalidHistorySize(0)
        );
    }

    #[test]
    fn config_should_reject_bad_upstream() {
        assert!(matches!(
            ProxyConfig::new(8090, "not a url", 10),
            Err(ConfigError::InvalidUpstream { .. })
        ));
        assert!(matches!(
            ProxyConfig::new(8090, "ftp://example.com", 10),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn upstream_base_should_drop_trailing_slash() {
        let config = ProxyConfig::new(8090, "https://api.example.com/v1/", 10).unwrap();
        assert_eq!(config.upstream_base(), "https://api.example.com/v1");

        let root = ProxyConfig::new(8090, "http://localhost:8080", 10).unwrap();
        assert_eq!(root.upstream_base(), "http://localhost:8080");
    }

    #[test]
    fn from_args_should_apply_overrides() {
        let args = CommandLineArgs::parse_from([
            "program",
            "--port",
            "9100",
            "--upstream",
            "http://127.0.0.1:3000",
            "--history-size",
            "3",
            "--collapse-case-insensitive",
            "--no-color",
            "--shutdown-grace",
            "1",
        ]);
        let config = ProxyConfig::from_args(&args).unwrap();

        assert_eq!(config.listen_addr().port(), 9100);
        assert_eq!(config.history_size, 3);
        assert!(!config.collapse_case_sensitive);
        assert!(!config.color);
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
    }
}
