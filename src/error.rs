//! Error types for Udpflow
//!
//! This module defines all custom error types used throughout the application.

use std::io;
use thiserror::Error;

/// Main error type for Udpflow operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local socket bind error
    #[error("Bind error: {0}")]
    Bind(String),

    /// Upstream address resolution error
    #[error("Resolve error: {0}")]
    Resolve(String),
}
