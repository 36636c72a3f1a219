//! Flow table
//!
//! Concurrent mapping from client identity to its flow. This is the only
//! structure mutated by more than one task; all synchronization lives here,
//! never at call sites.

use super::flow::Flow;
use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared mapping from client identity to its active flow
///
/// Mutated by the dispatch path (insert on first datagram) and by each
/// flow's own reverse task (remove on timeout or error).
pub struct FlowTable {
    /// Active flows keyed by client identity
    flows: RwLock<HashMap<SocketAddr, Arc<Flow>>>,
}

impl FlowTable {
    /// Create an empty flow table
    pub fn new() -> Self {
        FlowTable {
            flows: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the flow for a client identity
    pub async fn get(&self, client: &SocketAddr) -> Option<Arc<Flow>> {
        self.flows.read().await.get(client).cloned()
    }

    /// Atomically look up or create the flow for a client identity
    ///
    /// Returns the flow plus whether it was created by this call. The check
    /// and insert are double-checked under the write lock, so racing initial
    /// datagrams for one identity run `init` at most once.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        client: SocketAddr,
        init: F,
    ) -> Result<(Arc<Flow>, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Flow>>,
    {
        {
            let flows = self.flows.read().await;
            if let Some(flow) = flows.get(&client) {
                return Ok((Arc::clone(flow), false));
            }
        }

        let mut flows = self.flows.write().await;
        if let Some(flow) = flows.get(&client) {
            return Ok((Arc::clone(flow), false));
        }

        let flow = Arc::new(init().await?);
        flows.insert(client, Arc::clone(&flow));
        Ok((flow, true))
    }

    /// Remove the flow for a client identity, if present
    ///
    /// Removal is idempotent: each flow is removed only by its own reverse
    /// task or by shutdown, and a missing entry is not an error.
    pub async fn remove(&self, client: &SocketAddr) -> Option<Arc<Flow>> {
        self.flows.write().await.remove(client)
    }

    /// Remove and return every flow, leaving the table empty
    pub async fn drain(&self) -> Vec<Arc<Flow>> {
        self.flows
            .write()
            .await
            .drain()
            .map(|(_, flow)| flow)
            .collect()
    }

    /// Number of active flows
    pub async fn len(&self) -> usize {
        self.flows.read().await.len()
    }

    /// Whether the table has no active flows
    pub async fn is_empty(&self) -> bool {
        self.flows.read().await.is_empty()
    }
}

impl Default for FlowTable {
    fn default() -> Self {
        Self::new()
    }
}
