//! Command parameter keys and the typed parameter map.
//!
//! Commands arrive as `(transaction id, verb, parameter map)`; the map carries
//! string values keyed by the closed set of wire parameter letters. Typed
//! accessors parse values on demand and surface protocol errors instead of
//! panicking on malformed input.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use mgw_endpoint_core::{CallId, ConnectionId, ConnectionMode, ConnectionOptions};

use crate::error::{CommandError, Result};

/// Wire parameter keys understood by this core.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ParameterKey {
    /// `C`: call identifier, hex.
    CallId,
    /// `E`: endpoint identifier the command addresses.
    EndpointId,
    /// `Z`: specific endpoint identifier returned after wildcard resolution.
    SpecificEndpointId,
    /// `Z2`: secondary endpoint identifier (local-pair creation).
    SecondEndpointId,
    /// `I`: connection identifier, hex.
    ConnectionId,
    /// `I2`: secondary connection identifier, hex.
    SecondConnectionId,
    /// `M`: connection mode.
    Mode,
    /// `L`: local connection options.
    LocalConnectionOptions,
    /// `RD`: remote session description.
    RemoteSdp,
    /// `LD`: local session description.
    LocalSdp,
    /// `P`: connection transfer counters.
    ConnectionParameters,
}

impl ParameterKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKey::CallId => "C",
            ParameterKey::EndpointId => "E",
            ParameterKey::SpecificEndpointId => "Z",
            ParameterKey::SecondEndpointId => "Z2",
            ParameterKey::ConnectionId => "I",
            ParameterKey::SecondConnectionId => "I2",
            ParameterKey::Mode => "M",
            ParameterKey::LocalConnectionOptions => "L",
            ParameterKey::RemoteSdp => "RD",
            ParameterKey::LocalSdp => "LD",
            ParameterKey::ConnectionParameters => "P",
        }
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parameter map of one command or response.
#[derive(Debug, Clone, Default)]
pub struct Parameters(HashMap<ParameterKey, String>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for assembling commands and responses.
    pub fn with(mut self, key: ParameterKey, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn insert(&mut self, key: ParameterKey, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: ParameterKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: ParameterKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn require(&self, key: ParameterKey) -> Result<&str> {
        self.get(key).ok_or(CommandError::MissingParameter(key))
    }

    /// `C`, required, hex.
    pub fn call_id(&self) -> Result<CallId> {
        Ok(CallId::from_hex(self.require(ParameterKey::CallId)?)?)
    }

    /// `C`, optional, hex.
    pub fn opt_call_id(&self) -> Result<Option<CallId>> {
        self.get(ParameterKey::CallId)
            .map(|s| CallId::from_hex(s).map_err(CommandError::from))
            .transpose()
    }

    /// `E`, required.
    pub fn endpoint_id(&self) -> Result<&str> {
        self.require(ParameterKey::EndpointId)
    }

    /// `I`, required, hex.
    pub fn connection_id(&self) -> Result<ConnectionId> {
        Ok(ConnectionId::from_hex(self.require(ParameterKey::ConnectionId)?)?)
    }

    /// `I`, optional, hex.
    pub fn opt_connection_id(&self) -> Result<Option<ConnectionId>> {
        self.get(ParameterKey::ConnectionId)
            .map(|s| ConnectionId::from_hex(s).map_err(CommandError::from))
            .transpose()
    }

    /// `M`, required.
    pub fn mode(&self) -> Result<ConnectionMode> {
        Ok(self.require(ParameterKey::Mode)?.parse::<ConnectionMode>()?)
    }

    /// `M`, optional.
    pub fn opt_mode(&self) -> Result<Option<ConnectionMode>> {
        self.get(ParameterKey::Mode)
            .map(|s| s.parse::<ConnectionMode>().map_err(CommandError::from))
            .transpose()
    }

    /// `L`, optional, default empty.
    pub fn connection_options(&self) -> ConnectionOptions {
        self.get(ParameterKey::LocalConnectionOptions)
            .map(ConnectionOptions::parse)
            .unwrap_or_default()
    }

    /// `RD`, optional.
    pub fn remote_sdp(&self) -> Option<&str> {
        self.get(ParameterKey::RemoteSdp)
    }

    /// `Z2`, optional.
    pub fn second_endpoint_id(&self) -> Option<&str> {
        self.get(ParameterKey::SecondEndpointId)
    }
}
