//! Test utilities for Udpflow
//!
//! This module provides common test utilities used across integration tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use udpflow::config::{Config, RelayConfig};
use udpflow::relay::RelayEngine;

/// Spawn a UDP server that echoes every datagram back to its sender
pub async fn spawn_echo_server() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 65535];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    let _ = socket.send_to(&buf[..len], from).await;
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Spawn a UDP server that records each (payload, sender) pair and echoes
///
/// The receiver side of the channel yields every datagram the server saw,
/// in arrival order.
pub async fn spawn_capture_server() -> (SocketAddr, mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>)
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut buf = [0u8; 65535];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    if tx.send((buf[..len].to_vec(), from)).is_err() {
                        break;
                    }
                    let _ = socket.send_to(&buf[..len], from).await;
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

/// Test configuration targeting the given upstream with a short flow timeout
pub fn test_config(upstream: SocketAddr, flow_timeout_secs: u64) -> Config {
    let mut relay = RelayConfig::new(0, upstream.ip().to_string(), upstream.port());
    relay.flow_timeout = flow_timeout_secs;
    Config { relay }
}

/// Spawn a relay for the given configuration
///
/// Returns the engine (for flow-count assertions), the address clients
/// should send to, the shutdown sender, and the run handle.
pub async fn spawn_relay(
    config: Config,
) -> (
    Arc<RelayEngine>,
    SocketAddr,
    broadcast::Sender<bool>,
    JoinHandle<anyhow::Result<()>>,
) {
    let engine = Arc::new(RelayEngine::new(&config.relay).await.unwrap());

    // The listener binds 0.0.0.0; clients on loopback target 127.0.0.1
    let port = engine.local_addr().unwrap().port();
    let target = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

    (engine, target, shutdown_tx, handle)
}
