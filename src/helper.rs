//! Helper utilities for Udpflow
//!
//! This module provides common constants and utility functions used
//! throughout the application.

use crate::error::RelayError;
use anyhow::{Context, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Default datagram buffer size in bytes
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

/// Default idle timeout for a flow in seconds
pub const DEFAULT_FLOW_TIMEOUT_SECS: u64 = 30;

/// Default bound on concurrently dispatched datagrams
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Parse duration from seconds
pub fn duration_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Format a host and port as a connectable endpoint string
///
/// IPv6 literals are bracketed so the result parses as a socket address.
pub fn format_endpoint(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Resolve a host and port to a socket address
///
/// Resolution runs on a blocking task since `ToSocketAddrs` is blocking.
/// The first resolved address is used.
pub async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let target = format_endpoint(host, port);
    let resolved = tokio::task::spawn_blocking(move || {
        target
            .to_socket_addrs()
            .map_err(|e| RelayError::Resolve(format!("{}: {}", target, e)))?
            .next()
            .ok_or_else(|| RelayError::Resolve(format!("no addresses found for {}", target)))
    })
    .await
    .with_context(|| "DNS resolution task panicked")??;

    Ok(resolved)
}
