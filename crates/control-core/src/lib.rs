//! Command and workflow layer for the MGW media gateway control plane.
//!
//! Sits on top of [`mgw_endpoint_core`] and implements the transactional
//! CRCX/MDCX/DLCX-style commands: parameter validation, endpoint resolution
//! (including wildcard registration), the multi-step creation workflow with
//! compensating-action rollback, and the modify/delete workflows. Wire
//! parsing and serialization live elsewhere; this crate consumes parameter
//! maps and produces `(code, message, parameters)` results.

pub mod codes;
pub mod controller;
pub mod error;
pub mod params;
pub mod registry;
pub mod workflow;

pub use codes::ResponseCode;
pub use controller::{CommandVerb, GatewayController};
pub use error::{CommandError, Result};
pub use params::{ParameterKey, Parameters};
pub use registry::{CallLeg, CallRegistry};
pub use workflow::{
    CommandResult, CreateConnectionWorkflow, CreationState, CreationStep,
    DeleteConnectionWorkflow, ModifyConnectionWorkflow, RollbackStep,
};
