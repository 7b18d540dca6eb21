//! Error types for the endpoint aggregate layer.

use thiserror::Error;

use crate::types::{CallId, ConnectionId, ConnectionMode, ConnectionState};

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("call {0} not found")]
    CallNotFound(CallId),

    #[error("connection {connection} not found in call {call}")]
    ConnectionNotFound { call: CallId, connection: ConnectionId },

    #[error("endpoint unknown: {0}")]
    EndpointUnknown(String),

    #[error("unrecognized endpoint namespace: {0}")]
    UnrecognizedNamespace(String),

    #[error("invalid call identifier: {0}")]
    InvalidCallId(String),

    #[error("invalid connection identifier: {0}")]
    InvalidConnectionId(String),

    #[error("unknown connection mode: {0}")]
    UnknownMode(String),

    #[error("mode {0} not supported on this connection")]
    ModeNotSupported(ConnectionMode),

    #[error("connection is not joined to a peer")]
    NotJoined,

    #[error("connection is already joined to a peer")]
    AlreadyJoined,

    #[error("event {event} is not valid in state {state}")]
    InvalidTransition { state: ConnectionState, event: &'static str },

    #[error("unsupported remote session description")]
    UnsupportedDescription,

    #[error("endpoint invariant violated: {0}")]
    InvariantViolation(String),

    #[error("media channel failure: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, EndpointError>;
