//! Socket creation through socket2.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use super::TransportConfig;
use crate::error::{Result, TransportError};
use crate::types::PortRole;

/// Socket options applied before bind.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub send_buffer_size: usize,
    pub recv_buffer_size: usize,
    pub reuse_addr: bool,
}

impl SocketConfig {
    pub fn from_transport_config(config: &TransportConfig) -> Self {
        Self {
            send_buffer_size: config.send_buffer_size,
            recv_buffer_size: config.recv_buffer_size,
            reuse_addr: config.reuse_addr,
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self::from_transport_config(&TransportConfig::default())
    }
}

/// Create a non-blocking UDP socket bound to `addr`.
///
/// Bind failures carry the port role so startup errors name the port that
/// could not be opened.
pub fn create_udp_socket(addr: SocketAddr, role: PortRole, config: &SocketConfig) -> Result<Socket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    configure_socket(&socket, config)?;

    // Dual-stack when listening on an IPv6 wildcard
    if addr.is_ipv6() {
        socket
            .set_only_v6(false)
            .map_err(|e| TransportError::SocketError(e.to_string()))?;
    }

    socket.bind(&addr.into()).map_err(|e| TransportError::BindFailed {
        addr,
        role,
        reason: e.to_string(),
    })?;

    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    debug!(%addr, %role, "udp socket bound");
    Ok(socket)
}

fn configure_socket(socket: &Socket, config: &SocketConfig) -> Result<()> {
    socket
        .set_send_buffer_size(config.send_buffer_size)
        .map_err(|e| TransportError::SocketError(format!("set send buffer: {e}")))?;

    socket
        .set_recv_buffer_size(config.recv_buffer_size)
        .map_err(|e| TransportError::SocketError(format!("set recv buffer: {e}")))?;

    if config.reuse_addr {
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::SocketError(format!("set reuse addr: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_create_udp_socket() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = create_udp_socket(addr, PortRole::Telemetry, &SocketConfig::default()).unwrap();
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_bind_conflict_names_role() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = create_udp_socket(addr, PortRole::Lidar, &SocketConfig::default()).unwrap();
        let taken = first.local_addr().unwrap().as_socket().unwrap();

        let err = create_udp_socket(taken, PortRole::Planning, &SocketConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::BindFailed { role: PortRole::Planning, .. })
        ));
    }
}
