//! UDP transport for NCLink.
//!
//! One socket per configured listening port, each with its own
//! [`StreamFramer`](crate::protocol::StreamFramer) and receive task. Decoded
//! messages go to a single [`MessageHandler`]; outbound frames leave through
//! any bound socket toward a runtime-changeable [`TargetConfig`].

mod socket;
mod udp;

pub use socket::{create_udp_socket, SocketConfig};
pub use udp::{PortStats, UdpTransport};

use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::types::{ports, PortRole};

/// A listening port and its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub port: u16,

    /// Defaults to the role of the well-known port number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<PortRole>,
}

impl PortConfig {
    pub fn new(port: u16) -> Self {
        Self { port, role: None }
    }

    pub fn with_role(port: u16, role: PortRole) -> Self {
        Self {
            port,
            role: Some(role),
        }
    }

    pub fn effective_role(&self) -> PortRole {
        self.role.unwrap_or_else(|| PortRole::infer(self.port))
    }
}

/// Listening side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address every port binds on.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    #[serde(default = "default_ports")]
    pub ports: Vec<PortConfig>,

    /// Receive buffer size in bytes.
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer_size: usize,

    /// Send buffer size in bytes.
    #[serde(default = "default_send_buffer")]
    pub send_buffer_size: usize,

    /// Enable SO_REUSEADDR.
    #[serde(default)]
    pub reuse_addr: bool,

    /// Largest datagram read or written.
    #[serde(default = "default_max_datagram")]
    pub max_datagram_size: usize,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}
fn default_ports() -> Vec<PortConfig> {
    vec![
        PortConfig::new(ports::TELEMETRY_TEST),
        PortConfig::new(ports::LIDAR),
        PortConfig::new(ports::PLANNING_RECV),
    ]
}
fn default_recv_buffer() -> usize {
    1024 * 1024
}
fn default_send_buffer() -> usize {
    256 * 1024
}
fn default_max_datagram() -> usize {
    65535
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            ports: default_ports(),
            recv_buffer_size: default_recv_buffer(),
            send_buffer_size: default_send_buffer(),
            reuse_addr: false,
            max_datagram_size: default_max_datagram(),
        }
    }
}

impl TransportConfig {
    /// Listen on the given ports only.
    pub fn with_ports(ports: impl IntoIterator<Item = PortConfig>) -> Self {
        Self {
            ports: ports.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Bind address for one port.
    pub fn bind_addr(&self, port: u16) -> Result<SocketAddr> {
        let ip = self
            .listen_host
            .parse::<std::net::IpAddr>()
            .map_err(|e| Error::InvalidConfig(format!("listen_host {:?}: {e}", self.listen_host)))?;
        Ok(SocketAddr::new(ip, port))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::InvalidConfig("transport.ports must not be empty".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.ports {
            // Port 0 asks the OS for an ephemeral port and may repeat.
            if p.port != 0 && !seen.insert(p.port) {
                return Err(Error::InvalidConfig(format!("duplicate listen port {}", p.port)));
            }
        }
        self.bind_addr(0)?;
        if self.max_datagram_size == 0 || self.max_datagram_size > 65535 {
            return Err(Error::InvalidConfig(format!(
                "transport.max_datagram_size must be in 1..=65535, got {}",
                self.max_datagram_size
            )));
        }
        Ok(())
    }
}

/// Where outbound frames go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_target_host")]
    pub host: String,

    /// Receives control-input frames.
    #[serde(default = "default_command_port")]
    pub command_port: u16,

    /// Receives GCS command and waypoint frames.
    #[serde(default = "default_planning_port")]
    pub planning_port: u16,
}

fn default_target_host() -> String {
    "127.0.0.1".to_string()
}
fn default_command_port() -> u16 {
    ports::COMMAND
}
fn default_planning_port() -> u16 {
    ports::PLANNING_SEND
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_target_host(),
            command_port: default_command_port(),
            planning_port: default_planning_port(),
        }
    }
}

impl TargetConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("target.host must not be empty".into()));
        }
        if self.command_port == 0 || self.planning_port == 0 {
            return Err(Error::InvalidConfig("target ports must be non-zero".into()));
        }
        Ok(())
    }
}

/// Receiver of decoded messages.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, message: Message);
}

impl<F> MessageHandler for F
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: Message) {
        self(message);
    }
}

/// Outbound side of a transport, as seen by command dispatch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one datagram to `host:port`.
    async fn send(&self, data: &[u8], host: &str, port: u16) -> Result<usize>;

    /// Current outbound target.
    fn target(&self) -> TargetConfig;

    /// Token cancelled when the transport stops.
    fn shutdown_token(&self) -> CancellationToken;

    fn is_running(&self) -> bool;
}
