//! Connection-deletion workflow.
//!
//! One command shape covers three granularities: a single connection (call id
//! plus connection id), every connection of one call (call id only), or every
//! connection of the endpoint (neither). Single-connection deletion reports
//! the channel's transfer counters in the response.

use std::sync::Arc;
use tracing::info;

use mgw_endpoint_core::{ChannelStats, EndpointError, EndpointManager, EndpointSpec};

use crate::codes;
use crate::error::{CommandError, Result};
use crate::params::{ParameterKey, Parameters};
use crate::registry::CallRegistry;
use crate::workflow::CommandResult;

pub struct DeleteConnectionWorkflow {
    manager: Arc<EndpointManager>,
    registry: Arc<CallRegistry>,
}

impl DeleteConnectionWorkflow {
    pub fn new(manager: Arc<EndpointManager>, registry: Arc<CallRegistry>) -> Self {
        Self { manager, registry }
    }

    pub async fn execute(&self, transaction_id: u32, params: &Parameters) -> CommandResult {
        match self.run(params).await {
            Ok(parameters) => {
                CommandResult::success(transaction_id, codes::CONNECTION_DELETED, parameters)
            }
            Err(e) => CommandResult::failure(transaction_id, &e),
        }
    }

    async fn run(&self, params: &Parameters) -> Result<Parameters> {
        let endpoint_id = params.endpoint_id()?;
        let EndpointSpec::Specific(endpoint_id) = EndpointSpec::parse(endpoint_id) else {
            return Err(CommandError::WildcardTooComplicated(endpoint_id.to_string()));
        };
        let endpoint = self
            .manager
            .get_endpoint(&endpoint_id)
            .ok_or(EndpointError::EndpointUnknown(endpoint_id))?;

        let call_id = params.opt_call_id()?;
        let connection_id = params.opt_connection_id()?;

        match (call_id, connection_id) {
            (Some(call_id), Some(connection_id)) => {
                let connection = endpoint.delete_connection(call_id, connection_id).await?;
                self.registry.unregister(call_id, endpoint.id(), connection_id);
                info!(
                    "deleted connection {} of call {} on {}",
                    connection.hex_id(),
                    call_id,
                    endpoint.id()
                );
                Ok(Parameters::new().with(
                    ParameterKey::ConnectionParameters,
                    render_transfer_counters(&connection.stats()),
                ))
            }
            (Some(call_id), None) => {
                endpoint.delete_connections(call_id).await?;
                self.registry.remove_call(call_id);
                info!("deleted connections of call {} on {}", call_id, endpoint.id());
                Ok(Parameters::new())
            }
            (None, None) => {
                endpoint.delete_all_connections().await;
                self.registry.remove_endpoint(endpoint.id());
                info!("deleted all connections on {}", endpoint.id());
                Ok(Parameters::new())
            }
            // A connection id without its call id cannot be resolved.
            (None, Some(_)) => Err(CommandError::MissingParameter(ParameterKey::CallId)),
        }
    }
}

fn render_transfer_counters(stats: &ChannelStats) -> String {
    format!(
        "PS={}, OS={}, PR={}, OR={}, PL={}, JI={}",
        stats.packets_sent,
        stats.octets_sent,
        stats.packets_received,
        stats.octets_received,
        stats.packets_lost,
        stats.jitter_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_counters_render_in_wire_order() {
        let stats = ChannelStats {
            packets_sent: 10,
            octets_sent: 1600,
            packets_received: 9,
            octets_received: 1440,
            packets_lost: 1,
            jitter_ms: 0,
        };
        assert_eq!(render_transfer_counters(&stats), "PS=10, OS=1600, PR=9, OR=1440, PL=1, JI=0");
    }
}
