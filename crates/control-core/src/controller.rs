//! Command entry point.

use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use mgw_endpoint_core::EndpointManager;

use crate::params::Parameters;
use crate::registry::CallRegistry;
use crate::workflow::{
    CommandResult, CreateConnectionWorkflow, DeleteConnectionWorkflow, ModifyConnectionWorkflow,
};

/// Connection-handling command verbs this core implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerb {
    CreateConnection,
    ModifyConnection,
    DeleteConnection,
}

impl FromStr for CommandVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRCX" => Ok(CommandVerb::CreateConnection),
            "MDCX" => Ok(CommandVerb::ModifyConnection),
            "DLCX" => Ok(CommandVerb::DeleteConnection),
            other => Err(format!("unknown command verb: {}", other)),
        }
    }
}

/// Dispatches commands to their workflows. One controller serves the whole
/// gateway; workflow instances are per transaction and run concurrently.
pub struct GatewayController {
    manager: Arc<EndpointManager>,
    registry: Arc<CallRegistry>,
}

impl GatewayController {
    pub fn new(manager: Arc<EndpointManager>) -> Self {
        Self { manager, registry: CallRegistry::new() }
    }

    pub fn manager(&self) -> &Arc<EndpointManager> {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    /// Run one command to its terminal response.
    pub async fn handle(
        &self,
        verb: CommandVerb,
        transaction_id: u32,
        params: &Parameters,
    ) -> CommandResult {
        debug!("transaction {} dispatching {:?}", transaction_id, verb);
        match verb {
            CommandVerb::CreateConnection => {
                let mut workflow =
                    CreateConnectionWorkflow::new(self.manager.clone(), self.registry.clone());
                workflow.execute(transaction_id, params).await
            }
            CommandVerb::ModifyConnection => {
                ModifyConnectionWorkflow::new(self.manager.clone())
                    .execute(transaction_id, params)
                    .await
            }
            CommandVerb::DeleteConnection => {
                DeleteConnectionWorkflow::new(self.manager.clone(), self.registry.clone())
                    .execute(transaction_id, params)
                    .await
            }
        }
    }
}
