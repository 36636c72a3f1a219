//! Relay configuration types
//!
//! Defines the main configuration structures for the Udpflow relay.

use crate::helper::{
    format_endpoint, DEFAULT_FLOW_TIMEOUT_SECS, DEFAULT_MAX_IN_FLIGHT, DEFAULT_RECV_BUFFER_SIZE,
};
use serde::{Deserialize, Serialize};

/// Default idle timeout for a flow in seconds
fn default_flow_timeout() -> u64 {
    DEFAULT_FLOW_TIMEOUT_SECS
}

/// Default datagram buffer size in bytes
fn default_recv_buffer() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

/// Default bound on concurrently dispatched datagrams
fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Relay configuration
    pub relay: RelayConfig,
}

/// Relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayConfig {
    /// Local UDP port to listen on (0 binds an ephemeral port)
    pub local_port: u16,

    /// Upstream host all inbound traffic is forwarded to
    pub upstream_host: String,

    /// Upstream port all inbound traffic is forwarded to
    pub upstream_port: u16,

    /// Seconds of upstream silence before a flow expires
    #[serde(default = "default_flow_timeout")]
    pub flow_timeout: u64,

    /// Datagram buffer size in bytes; larger datagrams are truncated
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,

    /// Bound on concurrently dispatched datagrams
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl RelayConfig {
    /// Create a configuration with default tuning parameters
    pub fn new(local_port: u16, upstream_host: impl Into<String>, upstream_port: u16) -> Self {
        RelayConfig {
            local_port,
            upstream_host: upstream_host.into(),
            upstream_port,
            flow_timeout: default_flow_timeout(),
            recv_buffer: default_recv_buffer(),
            max_in_flight: default_max_in_flight(),
        }
    }

    /// The upstream endpoint as a displayable `host:port` string
    pub fn upstream_endpoint(&self) -> String {
        format_endpoint(&self.upstream_host, self.upstream_port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.upstream_host.is_empty() {
            return Err("upstream_host must not be empty".to_string());
        }
        if self.upstream_port == 0 {
            return Err("upstream_port must not be 0".to_string());
        }
        if self.flow_timeout == 0 {
            return Err("flow_timeout must be at least 1 second".to_string());
        }
        if self.recv_buffer == 0 {
            return Err("recv_buffer must not be 0".to_string());
        }
        if self.max_in_flight == 0 {
            return Err("max_in_flight must not be 0".to_string());
        }
        Ok(())
    }
}
