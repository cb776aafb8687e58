//! Configuration module for the dispatch daemon.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. The listening
//! port is the one required setting and must come from one of the two.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the daemon
#[derive(Parser, Debug)]
#[command(name = "dispatchd")]
#[command(version = "0.1.0")]
#[command(about = "A WebSocket command-dispatch daemon", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on for upgrade requests
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind (e.g. 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory for daily diagnostic log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Close connections that stay silent for this many seconds
    #[arg(long)]
    pub idle_timeout: Option<u64>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: Option<u16>,
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Idle timeout in seconds (absent = wait forever)
    pub idle_timeout: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            host: default_host(),
            idle_timeout: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily log files
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub idle_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    /// Merge parsed CLI arguments over the TOML file they may point at.
    pub fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let port = cli
            .port
            .or(toml_config.server.port)
            .ok_or(ConfigError::MissingPort)?;

        Ok(Config {
            port,
            host: cli.host.unwrap_or(toml_config.server.host),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
            log_dir: cli.log_dir.unwrap_or(toml_config.logging.dir),
            idle_timeout: cli
                .idle_timeout
                .or(toml_config.server.idle_timeout)
                .map(Duration::from_secs),
        })
    }

    /// The socket address string the server binds.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    MissingPort,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingPort => {
                write!(f, "No listening port configured (use --port or [server] port)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_port(port: Option<u16>) -> CliArgs {
        CliArgs {
            config: None,
            port,
            host: None,
            log_level: "info".to_string(),
            log_dir: None,
            idle_timeout: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, None);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            port = 8080
            host = "127.0.0.1"
            idle_timeout = 300

            [logging]
            level = "debug"
            dir = "/var/log/dispatchd"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, Some(8080));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.idle_timeout, Some(300));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir, PathBuf::from("/var/log/dispatchd"));
    }

    #[test]
    fn test_port_is_required() {
        let err = Config::resolve(cli_with_port(None)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPort));
    }

    #[test]
    fn test_cli_port_resolves() {
        let config = Config::resolve(cli_with_port(Some(9000))).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_idle_timeout_resolves_to_duration() {
        let mut cli = cli_with_port(Some(9000));
        cli.idle_timeout = Some(120);
        let config = Config::resolve(cli).unwrap();
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(120)));
    }
}
