//! UDP transport tests over loopback.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

use nclink::command::{CommandConfig, CommandDispatcher};
use nclink::error::{CommandError, Error, TransportError};
use nclink::messages::FlightStates;
use nclink::protocol::wire::WireRecord;
use nclink::protocol::{encode, func_code, Frame, Message, MessageKind, ProtocolConfig};
use nclink::transport::{PortConfig, TargetConfig, Transport, TransportConfig, UdpTransport};
use nclink::PortRole;

// ============================================================================
// Test Infrastructure
// ============================================================================

const WAIT: Duration = Duration::from_secs(2);

fn loopback_config(ports: impl IntoIterator<Item = PortConfig>) -> TransportConfig {
    TransportConfig {
        listen_host: "127.0.0.1".into(),
        ..TransportConfig::with_ports(ports)
    }
}

fn listening(ports: impl IntoIterator<Item = PortConfig>) -> (UdpTransport, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = UdpTransport::new(
        loopback_config(ports),
        ProtocolConfig::default(),
        TargetConfig::default(),
        move |msg: Message| {
            let _ = tx.send(msg);
        },
    );
    (transport, rx)
}

fn addr_of(transport: &UdpTransport, role: PortRole) -> SocketAddr {
    transport
        .local_addrs()
        .into_iter()
        .find(|(r, _)| *r == role)
        .map(|(_, addr)| addr)
        .expect("role not bound")
}

async fn client() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

fn states_frame(lat: f64) -> Vec<u8> {
    let states = FlightStates {
        lat,
        ..Default::default()
    };
    encode(func_code::STATES, &states.to_bytes()).unwrap()
}

// ============================================================================
// Receive path
// ============================================================================

#[tokio::test]
async fn test_messages_tagged_with_port_role() {
    let (transport, mut rx) = listening([
        PortConfig::with_role(0, PortRole::Telemetry),
        PortConfig::with_role(0, PortRole::Lidar),
    ]);
    transport.start().await.unwrap();

    let sender = client().await;
    sender
        .send_to(&states_frame(31.0), addr_of(&transport, PortRole::Telemetry))
        .await
        .unwrap();
    let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(msg.role, PortRole::Telemetry);
    assert_eq!(msg.states().map(|s| s.lat), Some(31.0));

    let flags = encode(func_code::AVOIDANCE_FLAG, &[1, 1, 0]).unwrap();
    sender
        .send_to(&flags, addr_of(&transport, PortRole::Lidar))
        .await
        .unwrap();
    let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(msg.role, PortRole::Lidar);
    assert_eq!(msg.kind, MessageKind::AvoidanceFlag);

    transport.stop().await;
}

#[tokio::test]
async fn test_frame_split_across_datagrams() {
    let (transport, mut rx) = listening([PortConfig::with_role(0, PortRole::Telemetry)]);
    transport.start().await.unwrap();
    let dest = addr_of(&transport, PortRole::Telemetry);

    let bytes = states_frame(12.5);
    let sender = client().await;
    sender.send_to(&bytes[..25], dest).await.unwrap();
    sender.send_to(&bytes[25..], dest).await.unwrap();

    let msg = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(msg.states().map(|s| s.lat), Some(12.5));

    transport.stop().await;
    let stats = transport.stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].datagrams, 2);
    assert_eq!(stats[0].framer.frames, 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_bind_failure_aborts_start() {
    let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let taken = occupied.local_addr().unwrap().port();

    let (transport, _rx) = listening([
        PortConfig::with_role(0, PortRole::Telemetry),
        PortConfig::with_role(taken, PortRole::Lidar),
    ]);
    let err = transport.start().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::BindFailed { role: PortRole::Lidar, .. })
    ));
    assert!(!transport.is_running());
    assert!(transport.local_addrs().is_empty());

    drop(occupied);
    transport.start().await.unwrap();
    assert_eq!(transport.local_addrs().len(), 2);
    transport.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent_and_restartable() {
    let (transport, mut rx) = listening([PortConfig::with_role(0, PortRole::Planning)]);

    transport.stop().await;
    transport.start().await.unwrap();
    transport.stop().await;
    transport.stop().await;
    assert!(!transport.is_running());
    assert!(transport.shutdown_token().is_cancelled());

    transport.start().await.unwrap();
    assert!(!transport.shutdown_token().is_cancelled());
    let dest = addr_of(&transport, PortRole::Planning);
    client().await.send_to(&states_frame(1.0), dest).await.unwrap();
    assert!(timeout(WAIT, rx.recv()).await.unwrap().is_some());
    transport.stop().await;
}

// ============================================================================
// Send path
// ============================================================================

#[tokio::test]
async fn test_send_reaches_target() {
    let receiver = client().await;
    let port = receiver.local_addr().unwrap().port();

    let (transport, _rx) = listening([PortConfig::new(0)]);
    transport.set_target(TargetConfig {
        host: "127.0.0.1".into(),
        command_port: port,
        planning_port: port,
    });
    transport.start().await.unwrap();

    let frame = encode(func_code::PARAMETER, &[1, 2, 3, 4]).unwrap();
    transport.send_to_target(&frame).await.unwrap();

    let mut buf = [0u8; 256];
    let (len, from) = timeout(WAIT, receiver.recv_from(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..len], &frame[..]);
    assert_eq!(from, transport.local_addrs()[0].1);

    transport.stop().await;
    assert!(transport.send(&frame, "127.0.0.1", port).await.is_err());
}

#[tokio::test]
async fn test_stop_cancels_command_sequence() {
    let receiver = client().await;
    let port = receiver.local_addr().unwrap().port();

    let (transport, _rx) = listening([PortConfig::new(0)]);
    transport.set_target(TargetConfig {
        host: "127.0.0.1".into(),
        command_port: port,
        planning_port: port,
    });
    transport.start().await.unwrap();
    let transport = Arc::new(transport);

    let config = CommandConfig {
        repeat_interval: Duration::from_millis(200),
        ..Default::default()
    };
    let dispatcher = Arc::new(CommandDispatcher::new(transport.clone(), config));
    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.send_indexed(9).await })
    };

    let mut buf = [0u8; 256];
    let (len, _) = timeout(WAIT, receiver.recv_from(&mut buf)).await.unwrap().unwrap();
    let first = Frame::decode(&buf[..len]).unwrap();
    assert_eq!(first.func_code, func_code::CONTROL_INPUT);

    transport.stop().await;
    let err = timeout(WAIT, task).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, Error::Command(CommandError::Cancelled { .. })));

    // Whatever was already in flight is drained; nothing new arrives.
    let mut received = 1;
    while timeout(Duration::from_millis(500), receiver.recv_from(&mut buf)).await.is_ok() {
        received += 1;
    }
    assert!(received < 7, "sequence kept sending: {received} datagrams");
}
