//! Endpoint, call and connection aggregate layer for the MGW media gateway.
//!
//! This crate owns the entities the control plane manipulates: endpoints
//! hosting calls, calls grouping connections, and connections running an
//! explicit state machine with half-open/open timeouts. The transport-facing
//! side of a connection hides behind the [`media::MediaChannel`] trait so the
//! control layer stays independent of how media actually moves.

pub mod call;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod media;
pub mod types;

pub use call::Call;
pub use connection::Connection;
pub use endpoint::{Endpoint, EndpointEvent};
pub use error::{EndpointError, Result};
pub use manager::{EndpointManager, EndpointSpec};
pub use media::{ChannelProvider, ChannelStats, DefaultChannelProvider, DirectionFlags, MediaChannel};
pub use types::{
    CallId, ConnectionConfig, ConnectionId, ConnectionMode, ConnectionOptions, ConnectionState,
};
