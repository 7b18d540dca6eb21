//! Connection-creation workflow.
//!
//! Two variants share one driver: a single connection toward a remote peer
//! (remote SDP optional, half-open when absent), or a joined pair of local
//! connections when a secondary endpoint is named. Execution pushes a
//! compensating action for every resource it creates; on failure the stack is
//! replayed in reverse, so only what actually exists gets undone and rollback
//! always terminates. The response carries the error that first raised the
//! failure, never a later rollback error.

use std::sync::Arc;
use tracing::{debug, info, warn};

use mgw_endpoint_core::{
    CallId, Connection, ConnectionId, ConnectionMode, ConnectionOptions, Endpoint,
    EndpointError, EndpointManager, EndpointSpec,
};

use crate::codes;
use crate::error::{CommandError, Result};
use crate::params::{ParameterKey, Parameters};
use crate::registry::CallRegistry;
use crate::workflow::CommandResult;

/// Execution sub-states, in the order the two variants visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStep {
    CreatingPrimaryConnection,
    HalfOpeningPrimaryConnection,
    OpeningPrimaryConnection,
    CreatingSecondaryConnection,
    OpeningSecondaryConnection,
    JoiningConnections,
    UpdatingPrimaryConnectionMode,
    UpdatingSecondaryConnectionMode,
    RegisteringPrimaryConnection,
    RegisteringSecondaryConnection,
}

/// Rollback sub-states; each corresponds to one compensating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStep {
    UnregisteringPrimaryConnection,
    UnregisteringSecondaryConnection,
    ClosingPrimaryConnection,
    ClosingSecondaryConnection,
}

/// Workflow states. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationState {
    ValidatingParameters,
    Executing(CreationStep),
    RollingBack(RollbackStep),
    Succeeded,
    Failed,
}

/// Per-transaction context; lives for one `execute` call.
struct CreationContext {
    call_id: CallId,
    mode: ConnectionMode,
    options: ConnectionOptions,
    remote_sdp: Option<String>,
    primary_endpoint: Arc<Endpoint>,
    secondary_endpoint: Option<Arc<Endpoint>>,
    primary: Option<Arc<Connection>>,
    secondary: Option<Arc<Connection>>,
    local_sdp: String,
}

/// A compensating action for one successfully executed step.
enum Compensation {
    Close {
        endpoint: Arc<Endpoint>,
        call_id: CallId,
        connection_id: ConnectionId,
        secondary: bool,
    },
    Unregister {
        call_id: CallId,
        endpoint_id: String,
        connection_id: ConnectionId,
        secondary: bool,
    },
}

impl Compensation {
    fn step(&self) -> RollbackStep {
        match self {
            Compensation::Close { secondary: false, .. } => RollbackStep::ClosingPrimaryConnection,
            Compensation::Close { secondary: true, .. } => RollbackStep::ClosingSecondaryConnection,
            Compensation::Unregister { secondary: false, .. } => {
                RollbackStep::UnregisteringPrimaryConnection
            }
            Compensation::Unregister { secondary: true, .. } => {
                RollbackStep::UnregisteringSecondaryConnection
            }
        }
    }
}

pub struct CreateConnectionWorkflow {
    manager: Arc<EndpointManager>,
    registry: Arc<CallRegistry>,
    trace: Vec<CreationState>,
    compensations: Vec<Compensation>,
}

impl CreateConnectionWorkflow {
    pub fn new(manager: Arc<EndpointManager>, registry: Arc<CallRegistry>) -> Self {
        Self { manager, registry, trace: Vec::new(), compensations: Vec::new() }
    }

    /// The states this instance visited, for observability and tests.
    pub fn trace(&self) -> &[CreationState] {
        &self.trace
    }

    /// Drive one creation command to its terminal response.
    pub async fn execute(&mut self, transaction_id: u32, params: &Parameters) -> CommandResult {
        self.enter(CreationState::ValidatingParameters);
        let mut ctx = match self.validate(params) {
            Ok(ctx) => ctx,
            Err(e) => {
                // Validation creates nothing, so there is nothing to undo.
                self.enter(CreationState::Failed);
                return CommandResult::failure(transaction_id, &e);
            }
        };
        match self.run(&mut ctx).await {
            Ok(()) => {
                self.enter(CreationState::Succeeded);
                info!(
                    "transaction {} created connection(s) for call {} on {}",
                    transaction_id,
                    ctx.call_id,
                    ctx.primary_endpoint.id()
                );
                CommandResult::success(transaction_id, codes::TRANSACTION_EXECUTED, Self::response(&ctx))
            }
            Err(e) => {
                warn!("transaction {} failed, rolling back: {}", transaction_id, e);
                self.roll_back().await;
                self.enter(CreationState::Failed);
                CommandResult::failure(transaction_id, &e)
            }
        }
    }

    fn validate(&self, params: &Parameters) -> Result<CreationContext> {
        let call_id = params.call_id()?;
        let mode = params.mode()?;
        let options = params.connection_options();
        let remote_sdp = params.remote_sdp().map(str::to_string);
        let second_endpoint_id = params.second_endpoint_id().map(str::to_string);
        if second_endpoint_id.is_some() && remote_sdp.is_some() {
            return Err(CommandError::ConflictingParameters(
                ParameterKey::SecondEndpointId,
                ParameterKey::RemoteSdp,
            ));
        }
        let primary_endpoint = self.resolve(params.endpoint_id()?)?;
        let secondary_endpoint =
            second_endpoint_id.as_deref().map(|id| self.resolve(id)).transpose()?;
        Ok(CreationContext {
            call_id,
            mode,
            options,
            remote_sdp,
            primary_endpoint,
            secondary_endpoint,
            primary: None,
            secondary: None,
            local_sdp: String::new(),
        })
    }

    /// Resolve an endpoint identifier: the match-all wildcard is rejected,
    /// the any-instance wildcard registers a fresh endpoint in its namespace.
    fn resolve(&self, raw: &str) -> Result<Arc<Endpoint>> {
        match EndpointSpec::parse(raw) {
            EndpointSpec::All => Err(CommandError::WildcardTooComplicated(raw.to_string())),
            EndpointSpec::AnyInstance(namespace) => {
                Ok(self.manager.register_endpoint(&namespace)?)
            }
            EndpointSpec::Specific(id) => self
                .manager
                .get_endpoint(&id)
                .ok_or_else(|| EndpointError::EndpointUnknown(id).into()),
        }
    }

    async fn run(&mut self, ctx: &mut CreationContext) -> Result<()> {
        if ctx.secondary_endpoint.is_some() {
            self.run_local_pair(ctx).await
        } else {
            self.run_remote(ctx).await
        }
    }

    /// Variant: single connection toward a remote peer.
    async fn run_remote(&mut self, ctx: &mut CreationContext) -> Result<()> {
        self.enter(CreationState::Executing(CreationStep::CreatingPrimaryConnection));
        let primary =
            ctx.primary_endpoint.create_connection(ctx.call_id, ConnectionMode::Inactive, false)?;
        self.compensations.push(Compensation::Close {
            endpoint: ctx.primary_endpoint.clone(),
            call_id: ctx.call_id,
            connection_id: primary.id(),
            secondary: false,
        });
        ctx.primary = Some(primary.clone());

        ctx.local_sdp = match &ctx.remote_sdp {
            Some(sdp) => {
                self.enter(CreationState::Executing(CreationStep::OpeningPrimaryConnection));
                primary.open(Some(sdp), &ctx.options).await?
            }
            None => {
                self.enter(CreationState::Executing(CreationStep::HalfOpeningPrimaryConnection));
                primary.half_open(&ctx.options).await?
            }
        };

        self.enter(CreationState::Executing(CreationStep::UpdatingPrimaryConnectionMode));
        primary.update_mode(ctx.mode).await?;

        self.enter(CreationState::Executing(CreationStep::RegisteringPrimaryConnection));
        self.register(ctx.call_id, &ctx.primary_endpoint, &primary, false);
        Ok(())
    }

    /// Variant: joined pair of local connections across two endpoints.
    async fn run_local_pair(&mut self, ctx: &mut CreationContext) -> Result<()> {
        let secondary_endpoint = ctx
            .secondary_endpoint
            .clone()
            .ok_or_else(|| CommandError::Internal("local pair without secondary endpoint".to_string()))?;

        self.enter(CreationState::Executing(CreationStep::CreatingPrimaryConnection));
        let primary =
            ctx.primary_endpoint.create_connection(ctx.call_id, ConnectionMode::Inactive, true)?;
        self.compensations.push(Compensation::Close {
            endpoint: ctx.primary_endpoint.clone(),
            call_id: ctx.call_id,
            connection_id: primary.id(),
            secondary: false,
        });
        ctx.primary = Some(primary.clone());

        self.enter(CreationState::Executing(CreationStep::OpeningPrimaryConnection));
        ctx.local_sdp = primary.open(None, &ctx.options).await?;

        self.enter(CreationState::Executing(CreationStep::CreatingSecondaryConnection));
        let secondary =
            secondary_endpoint.create_connection(ctx.call_id, ConnectionMode::Inactive, true)?;
        self.compensations.push(Compensation::Close {
            endpoint: secondary_endpoint.clone(),
            call_id: ctx.call_id,
            connection_id: secondary.id(),
            secondary: true,
        });
        ctx.secondary = Some(secondary.clone());

        self.enter(CreationState::Executing(CreationStep::OpeningSecondaryConnection));
        secondary.open(None, &ctx.options).await?;

        self.enter(CreationState::Executing(CreationStep::JoiningConnections));
        primary.join(&secondary).await?;

        self.enter(CreationState::Executing(CreationStep::UpdatingPrimaryConnectionMode));
        primary.update_mode(ctx.mode).await?;

        // The secondary leg always runs duplex, whatever the primary mode.
        self.enter(CreationState::Executing(CreationStep::UpdatingSecondaryConnectionMode));
        secondary.update_mode(ConnectionMode::SendRecv).await?;

        self.enter(CreationState::Executing(CreationStep::RegisteringPrimaryConnection));
        self.register(ctx.call_id, &ctx.primary_endpoint, &primary, false);

        self.enter(CreationState::Executing(CreationStep::RegisteringSecondaryConnection));
        self.register(ctx.call_id, &secondary_endpoint, &secondary, true);
        Ok(())
    }

    fn register(
        &mut self,
        call_id: CallId,
        endpoint: &Arc<Endpoint>,
        connection: &Arc<Connection>,
        secondary: bool,
    ) {
        self.registry.register(call_id, endpoint.id(), connection.id());
        self.compensations.push(Compensation::Unregister {
            call_id,
            endpoint_id: endpoint.id().to_string(),
            connection_id: connection.id(),
            secondary,
        });
    }

    /// Replay the compensation stack in reverse. A compensating action that
    /// itself fails is logged and treated as done, so rollback always reaches
    /// the terminal state and the caller always gets a response.
    async fn roll_back(&mut self) {
        while let Some(compensation) = self.compensations.pop() {
            self.enter(CreationState::RollingBack(compensation.step()));
            if let Err(e) = self.compensate(compensation).await {
                warn!("rollback step failed, continuing: {}", e);
            }
        }
    }

    async fn compensate(&self, compensation: Compensation) -> Result<()> {
        match compensation {
            Compensation::Close { endpoint, call_id, connection_id, .. } => {
                endpoint.delete_connection(call_id, connection_id).await?;
                Ok(())
            }
            Compensation::Unregister { call_id, endpoint_id, connection_id, .. } => {
                self.registry.unregister(call_id, &endpoint_id, connection_id);
                Ok(())
            }
        }
    }

    fn response(ctx: &CreationContext) -> Parameters {
        let mut parameters =
            Parameters::new().with(ParameterKey::SpecificEndpointId, ctx.primary_endpoint.id());
        if let Some(primary) = &ctx.primary {
            parameters.insert(ParameterKey::ConnectionId, primary.hex_id());
        }
        if let (Some(endpoint), Some(secondary)) = (&ctx.secondary_endpoint, &ctx.secondary) {
            parameters.insert(ParameterKey::SecondEndpointId, endpoint.id());
            parameters.insert(ParameterKey::SecondConnectionId, secondary.hex_id());
        }
        if !ctx.local_sdp.is_empty() {
            parameters.insert(ParameterKey::LocalSdp, ctx.local_sdp.clone());
        }
        parameters
    }

    fn enter(&mut self, state: CreationState) {
        debug!("creation workflow entered {:?}", state);
        self.trace.push(state);
    }
}
