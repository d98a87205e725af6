//! Per-port override directives
//!
//! Services carry a JSON object under [`OVERRIDES_V1_KEY`] keyed by
//! `"<PROTOCOL>/<port>"`:
//!
//! ```json
//! { "TCP/80": { "skip": true }, "UDP/53": { "port": 5353 } }
//! ```

use crate::portmap::{Port, Protocol};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Annotation holding the overrides
pub const OVERRIDES_V1_KEY: &str = "port-map.mzg.io/overrides-v1";

/// Errors decoding overrides
#[derive(Debug, Error)]
pub enum OverridesError {
    /// The value is not a JSON object of overrides
    #[error("invalid overrides JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A key is not of the form `PROTOCOL/port`
    #[error("unable to split the key {0:?}")]
    Key(String),

    /// The protocol part of a key is unknown
    #[error("unknown protocol in key {0:?}")]
    Protocol(String),

    /// The port part of a key is not a port number
    #[error("invalid port in key {0:?}")]
    Port(String),
}

/// A service port as exposed to the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortDescriptor {
    /// Protocol of the service port
    pub protocol: Protocol,
    /// Exposed port
    pub port: Port,
}

/// What to do differently for one port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    /// Don't map this port at all
    #[serde(default, alias = "Skip")]
    pub skip: bool,

    /// Gateway port to request instead of the exposed one (0 means no override)
    #[serde(default, alias = "Port")]
    pub port: u16,
}

/// Overrides by port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides(HashMap<PortDescriptor, Override>);

impl Overrides {
    /// Decode the overrides JSON object
    pub fn from_json(data: &str) -> Result<Self, OverridesError> {
        let raw: HashMap<String, Override> = serde_json::from_str(data)?;

        let mut overrides = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            overrides.insert(parse_key(&key)?, value);
        }
        Ok(Self(overrides))
    }

    /// Decode the overrides from a service's annotations
    ///
    /// A missing annotation means no overrides.
    pub fn from_annotations(annotations: &HashMap<String, String>) -> Result<Self, OverridesError> {
        match annotations.get(OVERRIDES_V1_KEY) {
            Some(data) => Self::from_json(data),
            None => Ok(Self::default()),
        }
    }

    /// Override for a port, if any
    pub fn get(&self, protocol: Protocol, port: Port) -> Option<&Override> {
        self.0.get(&PortDescriptor { protocol, port })
    }

    /// Number of overridden ports
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no port is overridden
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_key(key: &str) -> Result<PortDescriptor, OverridesError> {
    let (protocol, port) = key
        .split_once('/')
        .ok_or_else(|| OverridesError::Key(key.to_string()))?;

    let protocol =
        Protocol::from_name(protocol).ok_or_else(|| OverridesError::Protocol(key.to_string()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| OverridesError::Port(key.to_string()))?;

    Ok(PortDescriptor {
        protocol,
        port: Port(port),
    })
}
