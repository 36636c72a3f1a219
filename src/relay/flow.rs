//! Flow state and reverse forwarding
//!
//! A flow owns the upstream-facing socket for exactly one client and the
//! background task that relays upstream replies back to that client.

use super::listener::IngressListener;
use super::table::FlowTable;
use anyhow::{Context, Result};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One client's session with the upstream endpoint
///
/// The upstream-facing socket is bound to an ephemeral local port and
/// connected to the fixed upstream endpoint, so the kernel filters out
/// datagrams from any other source. The socket closes when the last
/// reference to the flow is dropped.
pub struct Flow {
    /// Client identity this flow belongs to
    client: SocketAddr,
    /// Upstream-facing socket, used only on behalf of this one client
    socket: UdpSocket,
    /// Handle of the reverse-forwarding task, retained for shutdown
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Flow {
    /// Open a new flow for `client` against the upstream endpoint
    ///
    /// Binds a fresh ephemeral-port socket in the upstream's address family
    /// and connects it to the upstream endpoint.
    pub async fn open(client: SocketAddr, upstream: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if upstream.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .with_context(|| "Failed to bind upstream-facing socket")?;
        socket
            .connect(upstream)
            .await
            .with_context(|| format!("Failed to connect upstream socket to {}", upstream))?;

        Ok(Flow {
            client,
            socket,
            task: Mutex::new(None),
        })
    }

    /// The client identity this flow belongs to
    pub fn client(&self) -> SocketAddr {
        self.client
    }

    /// Local address of the upstream-facing socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Forward a payload to the upstream endpoint
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf).await
    }

    /// Receive an upstream reply on this flow's socket
    pub(crate) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }

    /// Attach the reverse-forwarding task handle
    pub(crate) async fn set_task(&self, handle: JoinHandle<()>) {
        *self.task.lock().await = Some(handle);
    }

    /// Detach the reverse-forwarding task handle, if still attached
    pub(crate) async fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().await.take()
    }
}

/// Run the reverse-forwarding loop for one flow
///
/// Repeatedly performs a timed read on the flow's upstream socket and relays
/// each reply verbatim to the originating client through the ingress
/// listener. Exits on idle timeout, read error, relay error, or shutdown
/// signal; on exit the flow is removed from the table, which is the sole
/// reclamation mechanism for flows.
pub(crate) async fn reverse_loop(
    flow: Arc<Flow>,
    listener: Arc<IngressListener>,
    table: Arc<FlowTable>,
    idle_timeout: Duration,
    buf_size: usize,
    mut shutdown_rx: broadcast::Receiver<bool>,
) {
    let client = flow.client();
    let mut buf = vec![0u8; buf_size];

    loop {
        tokio::select! {
            result = tokio::time::timeout(idle_timeout, flow.recv(&mut buf)) => {
                match result {
                    Ok(Ok(len)) => {
                        if let Err(e) = listener.send_to(&buf[..len], client).await {
                            warn!("Failed to relay {} bytes to client {}: {}", len, client, e);
                            break;
                        }
                        debug!("Relayed {} bytes back to client {}", len, client);
                    }
                    Ok(Err(e)) => {
                        warn!("Upstream read error for client {}: {}", client, e);
                        break;
                    }
                    Err(_) => {
                        debug!("Flow for client {} idle, expiring", client);
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Shutdown signal received, closing flow for client {}", client);
                break;
            }
        }
    }

    table.remove(&client).await;
    debug!("Flow for client {} removed", client);
}
