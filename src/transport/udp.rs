//! Multi-port UDP transport.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::socket::{create_udp_socket, SocketConfig};
use super::{MessageHandler, TargetConfig, Transport, TransportConfig};
use crate::error::{Result, TransportError, WireContext};
use crate::protocol::{FramerStats, ProtocolConfig, StreamFramer};
use crate::types::PortRole;

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Framing counters for one listening port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortStats {
    pub port: u16,
    pub role: PortRole,
    pub local_addr: SocketAddr,
    pub datagrams: u64,
    pub framer: FramerStats,
}

struct BoundPort {
    role: PortRole,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    stats: Arc<Mutex<PortStats>>,
}

struct Running {
    ports: Vec<BoundPort>,
    tasks: Vec<JoinHandle<()>>,
}

/// UDP transport listening on every configured port.
pub struct UdpTransport {
    config: TransportConfig,
    protocol: ProtocolConfig,
    target: RwLock<TargetConfig>,
    handler: Arc<dyn MessageHandler>,
    running: Mutex<Option<Running>>,
    shutdown: RwLock<CancellationToken>,
    /// Counters of the last run, kept readable after stop.
    last_stats: Mutex<Vec<Arc<Mutex<PortStats>>>>,
}

impl UdpTransport {
    pub fn new(
        config: TransportConfig,
        protocol: ProtocolConfig,
        target: TargetConfig,
        handler: impl MessageHandler,
    ) -> Self {
        let shutdown = CancellationToken::new();
        // Not running until start.
        shutdown.cancel();
        Self {
            config,
            protocol,
            target: RwLock::new(target),
            handler: Arc::new(handler),
            running: Mutex::new(None),
            shutdown: RwLock::new(shutdown),
            last_stats: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Bind every configured port and spawn its receive task.
    ///
    /// Any bind failure aborts startup; sockets bound so far are released
    /// and the transport stays stopped.
    pub async fn start(&self) -> Result<()> {
        if self.running.lock().is_some() {
            return Err(TransportError::AlreadyRunning.into());
        }

        let socket_config = SocketConfig::from_transport_config(&self.config);
        let mut ports = Vec::with_capacity(self.config.ports.len());
        for port in &self.config.ports {
            let role = port.effective_role();
            let addr = self.config.bind_addr(port.port)?;
            // An early return drops `ports`, closing what was already bound.
            let std_socket = create_udp_socket(addr, role, &socket_config)?;
            let socket = UdpSocket::from_std(std_socket.into()).map_err(|e| TransportError::BindFailed {
                addr,
                role,
                reason: e.to_string(),
            })?;
            let local_addr = socket.local_addr()?;
            ports.push(BoundPort {
                role,
                socket: Arc::new(socket),
                local_addr,
                stats: Arc::new(Mutex::new(PortStats {
                    port: local_addr.port(),
                    role,
                    local_addr,
                    datagrams: 0,
                    framer: FramerStats::default(),
                })),
            });
        }

        let mut running = self.running.lock();
        if running.is_some() {
            return Err(TransportError::AlreadyRunning.into());
        }

        let token = CancellationToken::new();
        let tasks = ports
            .iter()
            .map(|port| {
                let framer = StreamFramer::new(port.role, self.protocol.clone());
                tokio::spawn(recv_loop(
                    Arc::clone(&port.socket),
                    framer,
                    Arc::clone(&self.handler),
                    token.clone(),
                    self.config.max_datagram_size,
                    Arc::clone(&port.stats),
                ))
            })
            .collect();

        for port in &ports {
            info!(addr = %port.local_addr, role = %port.role, "listening");
        }
        *self.last_stats.lock() = ports.iter().map(|p| Arc::clone(&p.stats)).collect();
        *self.shutdown.write() = token;
        *running = Some(Running { ports, tasks });
        Ok(())
    }

    /// Cancel receive tasks and in-flight command sequences, then close
    /// every socket. Calling it again is a no-op.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        self.shutdown.read().cancel();

        for result in join_all(running.tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "receive task ended abnormally");
            }
        }
        drop(running.ports);
        info!("transport stopped");
    }

    /// Actual bound addresses with their roles, in configuration order.
    pub fn local_addrs(&self) -> Vec<(PortRole, SocketAddr)> {
        self.running
            .lock()
            .as_ref()
            .map(|r| r.ports.iter().map(|p| (p.role, p.local_addr)).collect())
            .unwrap_or_default()
    }

    /// Per-port counters of the current or last run.
    pub fn stats(&self) -> Vec<PortStats> {
        self.last_stats.lock().iter().map(|s| *s.lock()).collect()
    }

    pub fn set_target(&self, target: TargetConfig) {
        info!(host = %target.host, command_port = target.command_port, "target changed");
        *self.target.write() = target;
    }

    /// Send to an already resolved address.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<usize> {
        if data.len() > self.config.max_datagram_size {
            return Err(TransportError::DatagramTooLarge {
                size: data.len(),
                max: self.config.max_datagram_size,
            }
            .into());
        }
        let socket = self.outbound_socket(addr)?;
        let sent = socket
            .send_to(data, addr)
            .await
            .map_err(|e| TransportError::SendFailed(format!("{addr}: {e}")))?;
        trace!(%addr, len = sent, "sent");
        Ok(sent)
    }

    /// Send to the command port of the current target.
    pub async fn send_to_target(&self, data: &[u8]) -> Result<usize> {
        let target = self.target();
        self.send(data, &target.host, target.command_port).await
    }

    fn outbound_socket(&self, dest: SocketAddr) -> Result<Arc<UdpSocket>> {
        let running = self.running.lock();
        let ports = &running.as_ref().ok_or(TransportError::NotRunning)?.ports;
        let locals: Vec<SocketAddr> = ports.iter().map(|p| p.local_addr).collect();
        outbound_index(&locals, dest)
            .map(|i| Arc::clone(&ports[i].socket))
            .ok_or_else(|| TransportError::NotRunning.into())
    }
}

/// Socket to send from: same address family first, then a dual-stack
/// wildcard (`::`), then whatever is bound.
fn outbound_index(locals: &[SocketAddr], dest: SocketAddr) -> Option<usize> {
    locals
        .iter()
        .position(|l| l.is_ipv6() == dest.is_ipv6())
        .or_else(|| locals.iter().position(|l| l.is_ipv6() && l.ip().is_unspecified()))
        .or_else(|| (!locals.is_empty()).then_some(0))
}

/// Pause after the n-th consecutive receive error, capped at one second.
fn recv_error_backoff(consecutive: u32) -> Duration {
    RECV_ERROR_BACKOFF
        .saturating_mul(consecutive)
        .min(Duration::from_secs(1))
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    let resolve_err = |reason: String| TransportError::ResolveFailed {
        host: host.to_string(),
        port,
        reason,
    };
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| resolve_err(e.to_string()))?
        .next()
        .ok_or_else(|| resolve_err("no addresses".into()).into())
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, data: &[u8], host: &str, port: u16) -> Result<usize> {
        let addr = resolve(host, port).await?;
        self.send_to(data, addr).await
    }

    fn target(&self) -> TargetConfig {
        self.target.read().clone()
    }

    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.read().clone()
    }

    fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.shutdown.read().cancel();
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    mut framer: StreamFramer,
    handler: Arc<dyn MessageHandler>,
    shutdown: CancellationToken,
    max_datagram: usize,
    stats: Arc<Mutex<PortStats>>,
) {
    let mut buf = vec![0u8; max_datagram];
    let mut errors: u32 = 0;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => {
                    errors = 0;
                    trace!(%peer, len, role = %framer.role(), "datagram");
                    for message in framer.feed(&buf[..len]) {
                        handler.on_message(message);
                    }
                    let mut stats = stats.lock();
                    stats.datagrams += 1;
                    stats.framer = framer.stats();
                }
                Err(e) => {
                    // ICMP unreachable from an earlier send shows up here on
                    // some platforms; the socket stays usable.
                    let context = WireContext {
                        role: framer.role(),
                        func_code: None,
                        peer: None,
                    };
                    errors = errors.saturating_add(1);
                    if errors.is_power_of_two() {
                        warn!(%context, error = %e, consecutive = errors, "receive error");
                    } else {
                        debug!(%context, error = %e, consecutive = errors, "receive error");
                    }
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(recv_error_backoff(errors)) => {}
                    }
                }
            }
        }
    }
    debug!(role = %framer.role(), buffered = framer.buffered(), "receive loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PortConfig;

    fn loopback(ports: &[PortConfig]) -> UdpTransport {
        let config = TransportConfig {
            listen_host: "127.0.0.1".into(),
            ..TransportConfig::with_ports(ports.iter().copied())
        };
        UdpTransport::new(config, ProtocolConfig::default(), TargetConfig::default(), |_: crate::protocol::Message| {})
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let transport = loopback(&[PortConfig::with_role(0, PortRole::Telemetry)]);
        assert!(!transport.is_running());
        assert!(transport.shutdown_token().is_cancelled());

        transport.start().await.unwrap();
        assert!(transport.is_running());
        assert!(!transport.shutdown_token().is_cancelled());
        assert!(transport.start().await.is_err());

        let addrs = transport.local_addrs();
        assert_eq!(addrs.len(), 1);
        assert_ne!(addrs[0].1.port(), 0);

        transport.stop().await;
        transport.stop().await;
        assert!(!transport.is_running());
        assert!(transport.local_addrs().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_running() {
        let transport = loopback(&[PortConfig::new(0)]);
        let err = transport.send(&[1, 2, 3], "127.0.0.1", 9).await.unwrap_err();
        assert!(err.needs_restart());
    }

    #[tokio::test]
    async fn test_oversized_datagram_rejected() {
        let mut config = TransportConfig::with_ports([PortConfig::new(0)]);
        config.listen_host = "127.0.0.1".into();
        config.max_datagram_size = 16;
        let transport = UdpTransport::new(config, ProtocolConfig::default(), TargetConfig::default(), |_: crate::protocol::Message| {});
        transport.start().await.unwrap();

        let err = transport.send(&[0u8; 17], "127.0.0.1", 9).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Transport(TransportError::DatagramTooLarge { size: 17, max: 16 })
        ));
        transport.stop().await;
    }

    #[test]
    fn test_outbound_socket_choice() {
        let addr = |s: &str| s.parse::<SocketAddr>().unwrap();
        let v4 = addr("10.0.0.9:18504");
        let v6 = addr("[fd00::9]:18504");

        // A loopback-only v6 socket cannot reach a v4 target.
        assert_eq!(outbound_index(&[addr("[::1]:5000"), addr("127.0.0.1:5001")], v4), Some(1));
        assert_eq!(outbound_index(&[addr("[::]:5000"), addr("0.0.0.0:5001")], v4), Some(1));
        assert_eq!(outbound_index(&[addr("127.0.0.1:5001"), addr("[::]:5000")], v6), Some(1));
        // Dual-stack wildcard carries v4 when nothing else does.
        assert_eq!(outbound_index(&[addr("[::1]:5000"), addr("[::]:5002")], v4), Some(1));
        assert_eq!(outbound_index(&[addr("[::1]:5000")], v4), Some(0));
        assert_eq!(outbound_index(&[], v4), None);
    }

    #[test]
    fn test_recv_error_backoff() {
        assert_eq!(recv_error_backoff(1), Duration::from_millis(10));
        assert_eq!(recv_error_backoff(5), Duration::from_millis(50));
        assert_eq!(recv_error_backoff(1000), Duration::from_secs(1));
        assert_eq!(recv_error_backoff(u32::MAX), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_set_target() {
        let transport = loopback(&[PortConfig::new(0)]);
        transport.set_target(TargetConfig {
            host: "10.0.0.2".into(),
            command_port: 2000,
            planning_port: 2001,
        });
        assert_eq!(transport.target().command_port, 2000);
    }
}
