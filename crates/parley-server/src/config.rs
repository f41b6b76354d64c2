//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PARLEY_*)
//! - TOML configuration file

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind the TCP listener to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP chat port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Presence side channel configuration.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Connection timeouts.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Fan-out router configuration.
    #[serde(default)]
    pub router: RouterSection,

    /// Message history configuration.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Presence side channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// UDP address the username snapshots are sent to.
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: String,

    /// Interval between snapshots in milliseconds.
    #[serde(default = "default_broadcast_interval")]
    pub interval_ms: u64,

    /// Per-send deadline in milliseconds.
    #[serde(default = "default_udp_timeout")]
    pub send_timeout_ms: u64,
}

/// Connection timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Idle deadline for every TCP read and write, in milliseconds.
    #[serde(default = "default_tcp_timeout")]
    pub tcp_timeout_ms: u64,

    /// Heartbeat probe interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
}

/// Fan-out router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSection {
    /// Bounded message queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Worker pool size.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Message history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of recent messages kept in memory.
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path.
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("PARLEY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("PARLEY_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8888)
}

fn default_broadcast_addr() -> String {
    "255.255.255.255:9999".to_string()
}

fn default_broadcast_interval() -> u64 {
    5_000
}

fn default_udp_timeout() -> u64 {
    5_000
}

fn default_tcp_timeout() -> u64 {
    30_000
}

fn default_heartbeat_interval() -> u64 {
    15_000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_workers() -> usize {
    10
}

fn default_history_capacity() -> usize {
    100
}

fn default_db_path() -> String {
    "parley.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            presence: PresenceConfig::default(),
            timeouts: TimeoutsConfig::default(),
            router: RouterSection::default(),
            history: HistoryConfig::default(),
            database: DatabaseConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: default_broadcast_addr(),
            interval_ms: default_broadcast_interval(),
            send_timeout_ms: default_udp_timeout(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            tcp_timeout_ms: default_tcp_timeout(),
            heartbeat_interval_ms: default_heartbeat_interval(),
        }
    }
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "parley.toml",
            "/etc/parley/parley.toml",
            "~/.config/parley/parley.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides.
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check configuration validity.
    ///
    /// # Errors
    ///
    /// Returns an error on empty addresses or zero durations/capacities.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.presence.broadcast_addr.is_empty() {
            bail!("host and broadcast address cannot be empty");
        }
        self.presence
            .broadcast_addr
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "invalid presence broadcast address: {}",
                    self.presence.broadcast_addr
                )
            })?;
        if self.timeouts.tcp_timeout_ms == 0
            || self.timeouts.heartbeat_interval_ms == 0
            || self.presence.interval_ms == 0
            || self.presence.send_timeout_ms == 0
        {
            bail!("timeouts and intervals must be positive");
        }
        if self.router.queue_capacity == 0 || self.router.workers == 0 {
            bail!("router queue capacity and worker count must be positive");
        }
        if self.history.capacity == 0 {
            bail!("history capacity must be positive");
        }
        Ok(())
    }

    /// The socket address the TCP listener binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not parse as an address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid host:port {}:{}", self.host, self.port))
    }

    /// The presence broadcast destination.
    ///
    /// Validated in [`Config::validate`], so this only fails on a config
    /// that bypassed validation.
    pub fn presence_addr(&self) -> Result<SocketAddr> {
        self.presence
            .broadcast_addr
            .parse()
            .context("invalid presence broadcast address")
    }

    /// Idle deadline for TCP reads and writes.
    #[must_use]
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.tcp_timeout_ms)
    }

    /// Heartbeat probe interval.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.heartbeat_interval_ms)
    }

    /// Presence snapshot interval.
    #[must_use]
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.presence.interval_ms)
    }

    /// Presence per-send deadline.
    #[must_use]
    pub fn presence_send_timeout(&self) -> Duration {
        Duration::from_millis(self.presence.send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.presence.broadcast_addr, "255.255.255.255:9999");
        assert_eq!(config.timeouts.heartbeat_interval_ms, 15_000);
        assert_eq!(config.router.workers, 10);
        assert_eq!(config.history.capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 7000

            [timeouts]
            tcp_timeout_ms = 10000

            [router]
            workers = 4
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert_eq!(config.timeouts.tcp_timeout_ms, 10_000);
        assert_eq!(config.router.workers, 4);
        // Untouched sections keep their defaults.
        assert_eq!(config.history.capacity, 100);
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = Config::default();
        config.timeouts.tcp_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.router.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_broadcast_addr() {
        let mut config = Config::default();
        config.presence.broadcast_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.tcp_timeout(), Duration::from_secs(30));
        assert_eq!(config.broadcast_interval(), Duration::from_secs(5));
    }
}
