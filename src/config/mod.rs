//! Configuration management for the NCLink engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::CommandConfig;
use crate::error::{Error, Result};
use crate::protocol::ProtocolConfig;
use crate::transport::{PortConfig, TargetConfig, TransportConfig};
use crate::types::{ports, PortRole};

/// Adds a listening port.
pub const ENV_LISTEN_PORT: &str = "GCS_LISTEN_PORT";
/// Overrides the target host.
pub const ENV_TARGET_IP: &str = "GCS_TARGET_IP";
/// Overrides the target command port.
pub const ENV_TARGET_PORT: &str = "GCS_TARGET_PORT";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listening ports and socket options.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Outbound command destination.
    #[serde(default)]
    pub target: TargetConfig,

    /// Framing behavior.
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Command repeat settings.
    #[serde(default)]
    pub command: CommandConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        self.target.validate()?;
        self.protocol.validate()?;
        self.command.validate()?;
        Ok(())
    }

    /// Apply `GCS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_LISTEN_PORT) {
            let port = parse_port(ENV_LISTEN_PORT, &value)?;
            if !self.transport.ports.iter().any(|p| p.port == port) {
                debug!(port, "listen port added from environment");
                self.transport.ports.push(PortConfig::new(port));
            }
        }
        if let Some(host) = lookup(ENV_TARGET_IP) {
            self.target.host = host.trim().to_string();
        }
        if let Some(value) = lookup(ENV_TARGET_PORT) {
            self.target.command_port = parse_port(ENV_TARGET_PORT, &value)?;
        }
        self.validate()
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "nclink", "nclink").map_or_else(
            || PathBuf::from("nclink.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Example configuration listening on every well-known inbound port.
    pub fn example() -> Self {
        Self {
            transport: TransportConfig::with_ports([
                PortConfig::with_role(ports::TELEMETRY, PortRole::Telemetry),
                PortConfig::with_role(ports::TELEMETRY_TEST, PortRole::Telemetry),
                PortConfig::with_role(ports::LIDAR, PortRole::Lidar),
                PortConfig::with_role(ports::PLANNING_RECV, PortRole::Planning),
            ]),
            target: TargetConfig::new("192.168.1.10"),
            ..Default::default()
        }
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value:?} is not a port: {e}")))
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color).with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
