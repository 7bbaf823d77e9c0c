//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use tracking_core::config::{InvalidConfig, TrackingConfig};
use tracking_core::model::Driver;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Bearer tokens accepted by the identity middleware.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Hub, connection and simulator tuning.
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Drivers loaded into the order store at start-up.
    #[serde(default)]
    pub drivers: Vec<Driver>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "tracking_core=debug,info".
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

/// Static token table: `token -> user id`.
///
/// ```toml
/// [auth.tokens]
/// "dev-token" = "user_1"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] InvalidConfig),
}

/// Loads configuration from a TOML file, falling back to defaults when the
/// file does not exist.
///
/// Environment variable overrides:
/// - `TRACKING_HOST` overrides `server.host`
/// - `TRACKING_PORT` overrides `server.port`
/// - `TRACKING_LOG_LEVEL` overrides `logging.level`
/// - `TRACKING_LOG_JSON` overrides `logging.json` ("true" or "1" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if a queue size, interval or deadline is zero.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => parse_config(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("TRACKING_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("TRACKING_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("TRACKING_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("TRACKING_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(contents)?;
    config.tracking.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert!(config.auth.tokens.is_empty());
        assert_eq!(config.tracking.connection.outbound_capacity, 256);
        assert_eq!(config.tracking.simulation.movement_steps, 20);
    }

    #[test]
    fn test_sections_are_read() {
        let config = parse_config(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [logging]
            level = "debug"
            json = true

            [auth.tokens]
            "secret" = "user_1"

            [tracking.connection]
            outbound_capacity = 8
            heartbeat_interval_ms = 500

            [tracking.simulation]
            movement_steps = 5
            accept_delay = { min_ms = 10, max_ms = 20 }

            [[drivers]]
            id = "driver_1"
            company_id = "company_1"
            full_name = "Ana Pérez"
            active = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert!(config.logging.json);
        assert_eq!(config.auth.tokens.get("secret").map(String::as_str), Some("user_1"));
        assert_eq!(config.tracking.connection.outbound_capacity, 8);
        assert_eq!(config.tracking.connection.heartbeat_interval_ms, 500);
        // Unset fields in a present table keep their defaults.
        assert_eq!(config.tracking.connection.read_timeout_ms, 60_000);
        assert_eq!(config.tracking.simulation.movement_steps, 5);
        assert_eq!(config.tracking.simulation.accept_delay.max_ms, 20);
        assert_eq!(config.drivers.len(), 1);
        assert_eq!(config.drivers[0].company_id, "company_1");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(matches!(
            parse_config("[server]\nport = \"not a number\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_capacities_and_intervals_are_rejected() {
        for (table, key) in [
            ("tracking.connection", "outbound_capacity"),
            ("tracking.connection", "heartbeat_interval_ms"),
            ("tracking.hub", "request_buffer"),
            ("tracking.hub", "store_buffer"),
        ] {
            let result = parse_config(&format!("[{}]\n{} = 0", table, key));
            match result {
                Err(ConfigError::Invalid(InvalidConfig::Zero(field))) => {
                    assert_eq!(field, format!("{}.{}", table, key))
                }
                other => panic!("{}.{} = 0 should be rejected, got {:?}", table, key, other),
            }
        }
    }

    #[test]
    fn test_invalid_file_fails_to_load() {
        let path = std::env::temp_dir().join(format!(
            "tracking-invalid-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[tracking.connection]\noutbound_capacity = 0\n").unwrap();

        let result = load_config(path.to_str());
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/tracking.toml")).unwrap();
        assert!(config.auth.tokens.is_empty());
    }
}
