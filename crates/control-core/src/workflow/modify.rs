//! Connection-modification workflow.

use std::sync::Arc;
use tracing::info;

use mgw_endpoint_core::{EndpointError, EndpointManager, EndpointSpec};

use crate::codes;
use crate::error::{CommandError, Result};
use crate::params::{ParameterKey, Parameters};
use crate::workflow::CommandResult;

/// Applies a new mode and/or remote description to one existing connection.
/// No multi-step resources are created, so there is no rollback path: the
/// first failing operation terminates the command.
pub struct ModifyConnectionWorkflow {
    manager: Arc<EndpointManager>,
}

impl ModifyConnectionWorkflow {
    pub fn new(manager: Arc<EndpointManager>) -> Self {
        Self { manager }
    }

    pub async fn execute(&self, transaction_id: u32, params: &Parameters) -> CommandResult {
        match self.run(params).await {
            Ok(parameters) => {
                CommandResult::success(transaction_id, codes::TRANSACTION_EXECUTED, parameters)
            }
            Err(e) => CommandResult::failure(transaction_id, &e),
        }
    }

    async fn run(&self, params: &Parameters) -> Result<Parameters> {
        let call_id = params.call_id()?;
        let endpoint_id = params.endpoint_id()?;
        // Modification addresses one concrete endpoint; wildcards make no sense here.
        let EndpointSpec::Specific(endpoint_id) = EndpointSpec::parse(endpoint_id) else {
            return Err(CommandError::WildcardTooComplicated(endpoint_id.to_string()));
        };
        let connection_id = params.connection_id()?;
        let mode = params.opt_mode()?;
        let options = params.connection_options();

        let endpoint = self
            .manager
            .get_endpoint(&endpoint_id)
            .ok_or(EndpointError::EndpointUnknown(endpoint_id))?;
        let connection = endpoint.get_connection(call_id, connection_id)?;

        if let Some(mode) = mode {
            connection.update_mode(mode).await?;
        }

        let mut parameters = Parameters::new();
        if let Some(sdp) = params.remote_sdp() {
            let local_sdp = if connection.is_open() {
                connection.renegotiate(sdp).await?
            } else {
                connection.open(Some(sdp), &options).await?
            };
            if !local_sdp.is_empty() {
                parameters.insert(ParameterKey::LocalSdp, local_sdp);
            }
        }
        info!(
            "modified connection {} of call {} on {}",
            connection.hex_id(),
            call_id,
            endpoint.id()
        );
        Ok(parameters)
    }
}
