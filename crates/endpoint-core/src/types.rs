//! Core identifier, mode and configuration types shared across the endpoint layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;
use std::time::Duration;

use crate::error::EndpointError;

/// Call identifier, carried on the wire in hexadecimal form.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CallId(pub u32);

impl CallId {
    /// Parse a call identifier from its hexadecimal wire form.
    pub fn from_hex(s: &str) -> Result<Self, EndpointError> {
        u32::from_str_radix(s.trim(), 16)
            .map(Self)
            .map_err(|_| EndpointError::InvalidCallId(s.to_string()))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Connection identifier, unique within one endpoint, rendered as hex.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Parse a connection identifier from its hexadecimal wire form.
    pub fn from_hex(s: &str) -> Result<Self, EndpointError> {
        u32::from_str_radix(s.trim(), 16)
            .map(Self)
            .map_err(|_| EndpointError::InvalidConnectionId(s.to_string()))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Directional capability of a connection.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConnectionMode {
    Inactive,
    SendOnly,
    RecvOnly,
    SendRecv,
    Conference,
    NetworkLoopback,
}

impl ConnectionMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Inactive => "inactive",
            ConnectionMode::SendOnly => "sendonly",
            ConnectionMode::RecvOnly => "recvonly",
            ConnectionMode::SendRecv => "sendrecv",
            ConnectionMode::Conference => "confrnce",
            ConnectionMode::NetworkLoopback => "netwloop",
        }
    }

    /// Contribution of this mode to the endpoint's aggregate counters.
    ///
    /// `RECV_ONLY` reads, `SEND_ONLY` writes, duplex modes do both,
    /// loopback only counts toward the loopback counter.
    pub fn contribution(&self) -> ModeDelta {
        match self {
            ConnectionMode::Inactive => ModeDelta::default(),
            ConnectionMode::SendOnly => ModeDelta { write: 1, ..Default::default() },
            ConnectionMode::RecvOnly => ModeDelta { read: 1, ..Default::default() },
            ConnectionMode::SendRecv | ConnectionMode::Conference => {
                ModeDelta { read: 1, write: 1, loopback: 0 }
            }
            ConnectionMode::NetworkLoopback => ModeDelta { loopback: 1, ..Default::default() },
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inactive" => Ok(ConnectionMode::Inactive),
            "sendonly" => Ok(ConnectionMode::SendOnly),
            "recvonly" => Ok(ConnectionMode::RecvOnly),
            "sendrecv" => Ok(ConnectionMode::SendRecv),
            "confrnce" => Ok(ConnectionMode::Conference),
            "netwloop" => Ok(ConnectionMode::NetworkLoopback),
            other => Err(EndpointError::UnknownMode(other.to_string())),
        }
    }
}

/// Signed change to the endpoint's read/write/loopback counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeDelta {
    pub read: i32,
    pub write: i32,
    pub loopback: i32,
}

impl ModeDelta {
    pub fn is_zero(&self) -> bool {
        self.read == 0 && self.write == 0 && self.loopback == 0
    }
}

impl Sub for ModeDelta {
    type Output = ModeDelta;

    fn sub(self, rhs: ModeDelta) -> ModeDelta {
        ModeDelta {
            read: self.read - rhs.read,
            write: self.write - rhs.write,
            loopback: self.loopback - rhs.loopback,
        }
    }
}

/// Connection state machine states. `Closed` is terminal.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    HalfOpen,
    Open,
    Corrupted,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "IDLE",
            ConnectionState::HalfOpen => "HALF_OPEN",
            ConnectionState::Open => "OPEN",
            ConnectionState::Corrupted => "CORRUPTED",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Local connection options, parsed from the `L:` comma list.
///
/// Unknown keys are preserved verbatim in `raw` so they survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub raw: String,
    pub packetization_period: Option<u8>,
    pub bandwidth: Option<u32>,
    pub codecs: Vec<String>,
}

impl ConnectionOptions {
    pub fn parse(s: &str) -> Self {
        let mut options = ConnectionOptions {
            raw: s.trim().to_string(),
            ..Default::default()
        };
        for item in s.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.split_once(':') {
                Some(("p", value)) => options.packetization_period = value.trim().parse().ok(),
                Some(("b", value)) => options.bandwidth = value.trim().parse().ok(),
                Some(("a", value)) => {
                    options.codecs = value
                        .split(';')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect();
                }
                _ => {}
            }
        }
        options
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Timer configuration applied to every connection an endpoint creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long a connection may stay half-open before it closes itself.
    pub half_open_timeout: Duration,
    /// How long a connection may stay open before it closes itself.
    pub open_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            half_open_timeout: Duration::from_secs(5),
            open_timeout: Duration::from_secs(3600),
        }
    }
}
