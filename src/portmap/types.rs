//! Protocol-neutral port mapping types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// IANA protocol number
///
/// See <https://www.iana.org/assignments/protocol-numbers/protocol-numbers.xhtml>.
/// Only [`Protocol::TCP`], [`Protocol::UDP`] and [`Protocol::SCTP`] are
/// meaningful to a gateway; [`Protocol::ANY`] is a request wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Protocol(pub u8);

impl Protocol {
    /// Any protocol (wildcard)
    pub const ANY: Protocol = Protocol(0);
    /// Transmission Control Protocol
    pub const TCP: Protocol = Protocol(6);
    /// User Datagram Protocol
    pub const UDP: Protocol = Protocol(17);
    /// Stream Control Transmission Protocol
    pub const SCTP: Protocol = Protocol(132);

    /// Parse a protocol name as used by service definitions (`TCP`, `udp`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TCP" => Some(Self::TCP),
            "UDP" => Some(Self::UDP),
            "SCTP" => Some(Self::SCTP),
            _ => None,
        }
    }

    /// Whether this is the wildcard value
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ANY => write!(f, "ANY"),
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::SCTP => write!(f, "SCTP"),
            Protocol(other) => write!(f, "{}", other),
        }
    }
}

/// Port number (for protocols that have ports)
///
/// Zero is [`Port::ANY`]:
/// - as the node port of a request it means the mapping applies to all
///   ports of the protocol;
/// - as the gateway port it lets the NAT server pick any available port.
///
/// This matches <https://tools.ietf.org/html/rfc6887#section-11.1>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(pub u16);

impl Port {
    /// Any port (wildcard)
    pub const ANY: Port = Port(0);
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Port(port)
    }
}

/// Mapping lifetime in seconds
///
/// In a [`Request`], [`Lifetime::DELETE`] asks for the mapping to be removed.
/// In a [`Response`] the value is the time remaining on the granted mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lifetime(pub u32);

impl Lifetime {
    /// Request removal of the mapping
    pub const DELETE: Lifetime = Lifetime(0);

    /// Lifetime as a duration
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.0))
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// A desired mapping state transition
///
/// Creates or renews the mapping when the lifetime is non-zero, deletes it
/// when the lifetime is [`Lifetime::DELETE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Mapped protocol
    pub protocol: Protocol,
    /// Internal (listening) port
    pub node_port: Port,
    /// Externally desired port
    pub gateway_port: Port,
    /// Requested lifetime
    pub lifetime: Lifetime,
}

impl Request {
    /// Build a request deleting the mapping identified by `protocol`,
    /// `node_port` and `gateway_port`
    pub fn delete(protocol: Protocol, node_port: Port, gateway_port: Port) -> Self {
        Self {
            protocol,
            node_port,
            gateway_port,
            lifetime: Lifetime::DELETE,
        }
    }

    /// Whether this request removes a mapping
    pub fn is_delete(&self) -> bool {
        self.lifetime == Lifetime::DELETE
    }
}

/// A mapping as granted by the NAT gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Mapped protocol
    pub protocol: Protocol,
    /// Internal (listening) port
    pub node_port: Port,
    /// Port actually granted on the gateway
    pub gateway_port: Port,
    /// External address actually granted
    pub gateway_ip: IpAddr,
    /// Seconds remaining on the mapping
    pub lifetime: Lifetime,
}

impl Response {
    /// The request that removes this exact mapping
    pub fn delete_request(&self) -> Request {
        Request::delete(self.protocol, self.node_port, self.gateway_port)
    }
}
