//! Flow-tracking UDP relay
//!
//! Accepts datagrams on a local port, forwards each to a single fixed
//! upstream endpoint over a per-client socket, and routes upstream replies
//! back to the originating client.

mod engine;
mod flow;
mod listener;
mod table;

pub use engine::RelayEngine;
pub use flow::Flow;
pub use listener::IngressListener;
pub use table::FlowTable;

use crate::config::Config;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Build a relay engine from the configuration and run it until shutdown
pub async fn run_relay(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    let engine = Arc::new(RelayEngine::new(&config.relay).await?);
    engine.run(shutdown_rx).await
}
