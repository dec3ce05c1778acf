//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//! A configuration must pass [`Config::validate`] before the server listens.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::server::CapacityPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection bound, interpreted by `capacity_policy`
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default)]
    pub capacity_policy: CapacityPolicy,

    /// Size of the per-connection read buffer; one read is one frame
    #[serde(default = "default_frame_buffer_size")]
    pub frame_buffer_size: usize,

    /// Deadline for a single write to a peer. Unset means writes may block
    /// for as long as the peer stalls.
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,

    /// Shared token required in `request_authentication`. Unset accepts any token.
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    10
}

fn default_frame_buffer_size() -> usize {
    1024 // 1 KB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            capacity_policy: CapacityPolicy::default(),
            frame_buffer_size: default_frame_buffer_size(),
            write_timeout_ms: None,
            auth_token: None,
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "server.max_connections must be at least 1".into(),
            ));
        }
        if self.frame_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "server.frame_buffer_size must be at least 1".into(),
            ));
        }
        if self.write_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "server.write_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                other
            ))),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("tcp-notify").join("config.toml")),
            Some(PathBuf::from("/etc/tcp-notify/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Check every section; nothing should listen on a config that fails this
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TCP_NOTIFY_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TCP_NOTIFY_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(max) = std::env::var("TCP_NOTIFY_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse() {
                self.server.max_connections = m;
            }
        }
        if let Ok(token) = std::env::var("TCP_NOTIFY_AUTH_TOKEN") {
            self.server.auth_token = Some(token);
        }

        if let Ok(level) = std::env::var("TCP_NOTIFY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TCP_NOTIFY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# tcp-notify Configuration
#
# Environment variables override these settings:
# - TCP_NOTIFY_HOST
# - TCP_NOTIFY_PORT
# - TCP_NOTIFY_MAX_CONNECTIONS
# - TCP_NOTIFY_AUTH_TOKEN
# - TCP_NOTIFY_LOG_LEVEL
# - TCP_NOTIFY_LOG_FORMAT

[server]
# Address to bind
host = "127.0.0.1"

# Port to listen on
port = 8080

# Connection bound
max_connections = 10

# How max_connections is applied:
# - "exact": at most max_connections live connections
# - "one_over": rejects only once the count exceeds max_connections,
#   admitting max_connections + 1
capacity_policy = "exact"

# Read buffer per connection (bytes); every frame must fit in one read
frame_buffer_size = 1024

# Deadline for a single write to a peer (ms). Unset: no deadline.
# write_timeout_ms = 5000

# Shared token clients must present. Unset: any token is accepted.
# auth_token = "change-me"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.server.addr(), "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 10);
        assert_eq!(config.server.capacity_policy, CapacityPolicy::Exact);
        assert_eq!(config.server.frame_buffer_size, 1024);
        assert!(config.server.write_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 3000
max_connections = 2
capacity_policy = "one_over"
write_timeout_ms = 250
auth_token = "secret"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.max_connections, 2);
        assert_eq!(config.server.capacity_policy, CapacityPolicy::OneOver);
        assert_eq!(config.server.write_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.server.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/tcp-notify.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.frame_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.write_timeout_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
