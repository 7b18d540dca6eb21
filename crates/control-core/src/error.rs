//! Error types for the command layer and their response-code mapping.

use thiserror::Error;

use mgw_endpoint_core::EndpointError;

use crate::codes::{self, ResponseCode};
use crate::params::ParameterKey;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("required parameter {0} is missing")]
    MissingParameter(ParameterKey),

    #[error("parameters {0} and {1} are mutually exclusive")]
    ConflictingParameters(ParameterKey, ParameterKey),

    #[error("wildcard endpoint identifier is too complicated: {0}")]
    WildcardTooComplicated(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CommandError {
    /// The terminal response code this error maps to.
    ///
    /// Domain errors keep their specific code; anything unexpected collapses
    /// to the generic protocol error so internals do not leak onto the wire.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            CommandError::MissingParameter(_) | CommandError::ConflictingParameters(_, _) => {
                codes::PROTOCOL_ERROR
            }
            CommandError::WildcardTooComplicated(_) => codes::WILDCARD_TOO_COMPLICATED,
            CommandError::Endpoint(e) => match e {
                EndpointError::CallNotFound(_) | EndpointError::InvalidCallId(_) => {
                    codes::INCORRECT_CALL_ID
                }
                EndpointError::ConnectionNotFound { .. }
                | EndpointError::InvalidConnectionId(_) => codes::INCORRECT_CONNECTION_ID,
                EndpointError::UnknownMode(_) | EndpointError::ModeNotSupported(_) => {
                    codes::UNSUPPORTED_MODE
                }
                EndpointError::UnsupportedDescription => codes::UNSUPPORTED_SDP,
                EndpointError::EndpointUnknown(_) | EndpointError::UnrecognizedNamespace(_) => {
                    codes::ENDPOINT_UNKNOWN
                }
                EndpointError::Channel(_)
                | EndpointError::NotJoined
                | EndpointError::AlreadyJoined
                | EndpointError::InvalidTransition { .. } => codes::TRANSIENT_ERROR,
                EndpointError::InvariantViolation(_) => codes::TRANSACTION_ABORTED,
            },
            CommandError::Internal(_) => codes::PROTOCOL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
