//! # Udpflow - Flow-Tracking Bidirectional UDP Relay
//!
//! Udpflow accepts UDP datagrams on a local listening port from arbitrary
//! remote clients, forwards each datagram to a single fixed upstream
//! endpoint, and routes reply datagrams from that upstream back to the
//! originating client.
//!
//! ## Features
//!
//! - **Per-Client Flows**: Each client gets a dedicated upstream-facing
//!   socket, so the upstream sees one source port per client
//! - **Idle Expiry**: Flows tear themselves down after a configurable
//!   window of upstream silence; no separate garbage-collection sweep
//! - **Concurrent Dispatch**: Traffic for different clients is forwarded
//!   independently, with a bound on in-flight dispatches
//! - **Graceful Shutdown**: Ctrl+C/SIGTERM stops the listener, signals
//!   every flow task, and closes every socket before exit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use udpflow::config::load_config;
//! use udpflow::relay::run_relay;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_relay(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! The ingress listener owns the single local-facing socket. For each
//! inbound datagram the relay engine looks up (or atomically creates) the
//! client's flow in the flow table and forwards the payload through the
//! flow's connected upstream socket. Each flow runs one reverse task that
//! relays upstream replies back through the listener socket.
//!
//! ```text
//! Client -> Ingress Listener -> Relay Engine -> Flow -> Upstream
//! Client <- Ingress Listener <- Reverse Task <- Flow <- Upstream
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod relay;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::RelayError;
pub use relay::{run_relay, RelayEngine};

/// Version of the Udpflow library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "udpflow");
    }
}
