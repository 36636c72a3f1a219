//! Relay engine
//!
//! Per-datagram dispatch: looks up or creates the flow for each inbound
//! datagram, forwards the payload upstream, and keeps every flow's reverse
//! task running.

use super::flow::{reverse_loop, Flow};
use super::listener::IngressListener;
use super::table::FlowTable;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::helper::{duration_from_secs, resolve_addr};
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, trace, warn};

/// Grace period for flow tasks to stop during shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The relay engine tying the ingress listener, flow table, and flows
/// together
pub struct RelayEngine {
    /// Shared local-facing socket
    listener: Arc<IngressListener>,
    /// Active flows keyed by client identity
    table: Arc<FlowTable>,
    /// Resolved upstream endpoint all traffic is forwarded to
    upstream: SocketAddr,
    /// Idle timeout after which a flow expires
    flow_timeout: Duration,
    /// Datagram buffer size
    recv_buffer: usize,
    /// Bound on concurrently dispatched datagrams
    limiter: Arc<Semaphore>,
    /// Shutdown signal fanned out to every reverse task
    flow_shutdown: broadcast::Sender<bool>,
}

impl RelayEngine {
    /// Create a new engine from the given configuration
    ///
    /// Binds the ingress socket and resolves the upstream endpoint; both
    /// failures are fatal at startup.
    pub async fn new(config: &RelayConfig) -> Result<Self> {
        config.validate().map_err(RelayError::Config)?;

        let listener = Arc::new(IngressListener::bind(config.local_port)?);
        let upstream = resolve_addr(&config.upstream_host, config.upstream_port).await?;
        let (flow_shutdown, _) = broadcast::channel(1);

        Ok(RelayEngine {
            listener,
            table: Arc::new(FlowTable::new()),
            upstream,
            flow_timeout: duration_from_secs(config.flow_timeout),
            recv_buffer: config.recv_buffer,
            limiter: Arc::new(Semaphore::new(config.max_in_flight)),
            flow_shutdown,
        })
    }

    /// The bound local address of the ingress socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The resolved upstream endpoint
    pub fn upstream_addr(&self) -> SocketAddr {
        self.upstream
    }

    /// Number of currently active flows
    pub async fn flow_count(&self) -> usize {
        self.table.len().await
    }

    /// Run the relay until shutdown or a fatal listener error
    ///
    /// On either exit path every reverse task is signalled, the flow table
    /// is drained, and task exits are awaited so all sockets are closed
    /// before this returns.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("Relay listening on {}", self.listener.local_addr()?);
        info!("Forwarding to upstream {}", self.upstream);

        let mut buf = vec![0u8; self.recv_buffer];
        let result = loop {
            tokio::select! {
                received = self.listener.recv_from(&mut buf) => {
                    match received {
                        Ok((len, client)) => {
                            trace!("Received {} bytes from {}", len, client);
                            let payload = Bytes::copy_from_slice(&buf[..len]);

                            // Backpressure: wait for a dispatch slot instead of
                            // spawning without bound under bursty traffic
                            let permit = match Arc::clone(&self.limiter).acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => break Ok(()),
                            };

                            let engine = Arc::clone(&self);
                            tokio::spawn(async move {
                                engine.dispatch(payload, client).await;
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!("Ingress receive error: {}", e);
                            break Err(e).with_context(|| "Ingress listener failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping relay");
                    break Ok(());
                }
            }
        };

        self.shutdown().await;
        info!("Relay stopped");
        result
    }

    /// Dispatch one inbound datagram
    ///
    /// The flow reference is never cached across datagrams; each dispatch
    /// re-looks-up (or re-creates) the flow, so a concurrent expiry simply
    /// results in a fresh flow on the next datagram.
    async fn dispatch(&self, payload: Bytes, client: SocketAddr) {
        let (flow, created) = match self
            .table
            .get_or_insert_with(client, || Flow::open(client, self.upstream))
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to open flow for client {}: {:#}", client, e);
                return;
            }
        };

        if created {
            let handle = tokio::spawn(reverse_loop(
                Arc::clone(&flow),
                Arc::clone(&self.listener),
                Arc::clone(&self.table),
                self.flow_timeout,
                self.recv_buffer,
                self.flow_shutdown.subscribe(),
            ));
            flow.set_task(handle).await;
            debug!("Created flow for client {}", client);
        }

        // A single send error does not mean the flow is dead; drop the
        // datagram and let the reverse timeout handle cleanup
        match flow.send(&payload).await {
            Ok(len) => debug!("Forwarded {} bytes from {} to {}", len, client, self.upstream),
            Err(e) => warn!("Forward to {} failed for client {}: {}", self.upstream, client, e),
        }
    }

    /// Signal every reverse task, drain the table, and await task exits
    async fn shutdown(&self) {
        let _ = self.flow_shutdown.send(true);

        let flows = self.table.drain().await;
        let mut handles = Vec::with_capacity(flows.len());
        for flow in &flows {
            if let Some(handle) = flow.take_task().await {
                handles.push(handle);
            }
        }

        if handles.is_empty() {
            return;
        }

        debug!("Waiting for {} flow tasks to stop", handles.len());
        if tokio::time::timeout(SHUTDOWN_GRACE, future::join_all(handles))
            .await
            .is_err()
        {
            warn!("Timed out waiting for flow tasks to stop");
        }

        // Dispatches already in flight when the drain ran may have inserted
        // new flows; their tasks subscribed after the signal, so stop them
        // directly
        for flow in self.table.drain().await {
            if let Some(handle) = flow.take_task().await {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_binds_and_resolves() {
        let config = RelayConfig::new(0, "127.0.0.1", 9001);
        let engine = RelayEngine::new(&config).await.unwrap();

        assert!(engine.local_addr().unwrap().port() > 0);
        assert_eq!(
            engine.upstream_addr(),
            "127.0.0.1:9001".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(engine.flow_count().await, 0);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = RelayConfig::new(0, "", 9001);
        assert!(RelayEngine::new(&config).await.is_err());

        let mut config = RelayConfig::new(0, "127.0.0.1", 9001);
        config.max_in_flight = 0;
        assert!(RelayEngine::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_new_rejects_unresolvable_upstream() {
        let config = RelayConfig::new(0, "definitely-not-a-host.invalid", 9001);
        assert!(RelayEngine::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let config = RelayConfig::new(0, "127.0.0.1", 9001);
        let engine = Arc::new(RelayEngine::new(&config).await.unwrap());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
