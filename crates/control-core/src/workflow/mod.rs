//! Command workflows.
//!
//! Each workflow drives one command to exactly one terminal
//! [`CommandResult`], through rollback if execution fails partway.

pub mod create;
pub mod delete;
pub mod modify;

use crate::codes::ResponseCode;
use crate::error::CommandError;
use crate::params::Parameters;

pub use create::{CreateConnectionWorkflow, CreationState, CreationStep, RollbackStep};
pub use delete::DeleteConnectionWorkflow;
pub use modify::ModifyConnectionWorkflow;

/// The terminal response of one command transaction.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub transaction_id: u32,
    pub code: u16,
    pub message: String,
    pub parameters: Parameters,
}

impl CommandResult {
    pub(crate) fn success(transaction_id: u32, code: ResponseCode, parameters: Parameters) -> Self {
        Self {
            transaction_id,
            code: code.code,
            message: code.message.to_string(),
            parameters,
        }
    }

    pub(crate) fn failure(transaction_id: u32, error: &CommandError) -> Self {
        let code = error.response_code();
        // Internal detail stays in the log; the wire only sees the table message.
        let message = match error {
            CommandError::Internal(detail) => {
                tracing::error!("transaction {} failed internally: {}", transaction_id, detail);
                code.message.to_string()
            }
            _ => format!("{}: {}", code.message, error),
        };
        Self {
            transaction_id,
            code: code.code,
            message,
            parameters: Parameters::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code < 300
    }
}
