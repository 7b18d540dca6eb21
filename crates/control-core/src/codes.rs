//! Response-code table.
//!
//! Fixed (code, message) pairs in the classic media-gateway control style.
//! Pure lookup data; the mapping from errors to codes lives in
//! [`crate::error::CommandError::response_code`].

use serde::Serialize;

/// One entry of the response-code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseCode {
    pub code: u16,
    pub message: &'static str,
}

pub const TRANSACTION_EXECUTED: ResponseCode = ResponseCode {
    code: 200,
    message: "The requested transaction was executed normally",
};

pub const CONNECTION_DELETED: ResponseCode = ResponseCode {
    code: 250,
    message: "The connection was deleted",
};

pub const TRANSIENT_ERROR: ResponseCode = ResponseCode {
    code: 400,
    message: "The transaction could not be executed due to a transient error",
};

pub const TRANSACTION_ABORTED: ResponseCode = ResponseCode {
    code: 407,
    message: "The transaction was aborted",
};

pub const ENDPOINT_UNKNOWN: ResponseCode = ResponseCode {
    code: 500,
    message: "The transaction could not be executed because the endpoint is unknown",
};

pub const WILDCARD_TOO_COMPLICATED: ResponseCode = ResponseCode {
    code: 504,
    message: "Unknown or unsupported command: wildcard too complicated",
};

pub const UNSUPPORTED_SDP: ResponseCode = ResponseCode {
    code: 505,
    message: "Unsupported remote session description",
};

pub const PROTOCOL_ERROR: ResponseCode = ResponseCode {
    code: 510,
    message: "The transaction could not be executed because of a protocol error",
};

pub const INCORRECT_CONNECTION_ID: ResponseCode = ResponseCode {
    code: 515,
    message: "The transaction refers to an incorrect connection-id",
};

pub const INCORRECT_CALL_ID: ResponseCode = ResponseCode {
    code: 516,
    message: "The transaction refers to an incorrect call-id",
};

pub const UNSUPPORTED_MODE: ResponseCode = ResponseCode {
    code: 517,
    message: "Unsupported or invalid mode",
};

impl ResponseCode {
    /// Provisional and success classes are below 300.
    pub fn is_success(&self) -> bool {
        self.code < 300
    }
}
