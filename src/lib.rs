//! pcp-portmap - NAT port mappings through an external PCP client
//!
//! This library requests, renews and verifies port mappings on a NAT
//! gateway using the Port Control Protocol. The protocol itself is spoken
//! by an external command-line client; this crate runs it one request at a
//! time, parses its output and unwinds mappings granted on other terms
//! than requested.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod mock;
pub mod pcp;
pub mod portmap;
pub mod reconcile;

/// Result type alias for pcp-portmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pcp-portmap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Port mapping error
    #[error("Port map error: {0}")]
    Map(#[from] portmap::MapError),

    /// Checked port mapping error
    #[error("Port map error: {0}")]
    MapPort(#[from] portmap::MapPortError),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

/// Initialize logging
pub fn init() {
    tracing_subscriber::fmt::init();
}

#[cfg(test)]
mod tests;
