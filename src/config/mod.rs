//! Configuration module for Udpflow
//!
//! This module provides configuration types and parsing for the relay.

mod relay;

pub use relay::{Config, RelayConfig};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let config_str = r#"
[relay]
local_port = 9000
upstream_host = "127.0.0.1"
upstream_port = 9001
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.relay.local_port, 9000);
        assert_eq!(config.relay.upstream_host, "127.0.0.1");
        assert_eq!(config.relay.upstream_port, 9001);
        // Defaulted fields
        assert_eq!(config.relay.flow_timeout, 30);
        assert_eq!(config.relay.recv_buffer, 4096);
        assert_eq!(config.relay.max_in_flight, 1024);
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[relay]
local_port = 1194
upstream_host = "vpn.example.com"
upstream_port = 1194
flow_timeout = 120
recv_buffer = 65535
max_in_flight = 256
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.relay.local_port, 1194);
        assert_eq!(config.relay.upstream_host, "vpn.example.com");
        assert_eq!(config.relay.upstream_port, 1194);
        assert_eq!(config.relay.flow_timeout, 120);
        assert_eq!(config.relay.recv_buffer, 65535);
        assert_eq!(config.relay.max_in_flight, 256);
    }

    #[test]
    fn test_parse_missing_required_field() {
        let config_str = r#"
[relay]
local_port = 9000
"#;

        assert!(parse_config(config_str).is_err());
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(parse_config("not valid toml [").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[relay]
local_port = 9000
upstream_host = "127.0.0.1"
upstream_port = 9001
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.relay.local_port, 9000);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/udpflow.toml").is_err());
    }
}
