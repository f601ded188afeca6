//! Configuration file support for the telemetry server.
//!
//! Loads settings from `~/.config/sim-telemetry/config.toml` on Linux
//! (or platform-appropriate location on other OSes). Command-line flags
//! override file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::server::DEFAULT_PORT;

/// Default bind address: all interfaces.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind the telemetry listener to.
    pub bind: String,

    /// Port to listen on for telemetry connections.
    pub port: u16,

    /// Print statistics every N seconds.
    pub stats_interval: u64,

    /// Suppress per-sample console output.
    pub quiet: bool,

    /// Enable Prometheus metrics HTTP endpoint.
    pub metrics_enabled: bool,

    /// Port for Prometheus metrics HTTP endpoint.
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            stats_interval: 30,
            quiet: false,
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
            }
            _ => Ok(Config::default()),
        }
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sim-telemetry/config.toml"))
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        self.bind
            .parse::<IpAddr>()
            .map_err(|_| anyhow::anyhow!("Invalid bind address: {}", self.bind))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.stats_interval, 30);
        assert!(!config.quiet);
        assert!(!config.metrics_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            port = 6000
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 6000);
        // Other fields should use defaults
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.stats_interval, 30);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            bind = "127.0.0.1"
            port = 5051
            stats_interval = 60
            quiet = true
            metrics_enabled = true
            metrics_port = 9091
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 5051);
        assert_eq!(config.stats_interval, 60);
        assert!(config.quiet);
        assert!(config.metrics_enabled);
        assert_eq!(config.metrics_port, 9091);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_bind() {
        let config = Config {
            bind: "not-an-address".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_ipv6() {
        let config = Config {
            bind: "::1".to_string(),
            ..Config::default()
        };
        config.validate().unwrap();
    }
}
