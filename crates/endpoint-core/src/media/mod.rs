//! Media channel seam.
//!
//! A [`Connection`](crate::connection::Connection) owns exactly one media
//! channel. The channel carries the transport-facing half of the connection:
//! binding local resources, accepting a remote session description, direction
//! flags, and joining to a peer channel for local pairs. Actual RTP transport
//! plugs in behind this trait; the in-crate implementations keep the state a
//! gateway needs without moving packets.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::ConnectionMode;

pub mod local;
pub mod remote;

pub use local::LocalChannel;
pub use remote::RemoteChannel;

/// Transmit/receive flags applied to a channel by a mode update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionFlags {
    pub transmit: bool,
    pub receive: bool,
}

impl From<ConnectionMode> for DirectionFlags {
    fn from(mode: ConnectionMode) -> Self {
        match mode {
            ConnectionMode::SendOnly => DirectionFlags { transmit: true, receive: false },
            ConnectionMode::RecvOnly => DirectionFlags { transmit: false, receive: true },
            ConnectionMode::SendRecv | ConnectionMode::Conference => {
                DirectionFlags { transmit: true, receive: true }
            }
            ConnectionMode::Inactive | ConnectionMode::NetworkLoopback => DirectionFlags::default(),
        }
    }
}

/// Transfer counters gathered for delete responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub packets_sent: u64,
    pub octets_sent: u64,
    pub packets_received: u64,
    pub octets_received: u64,
    pub packets_lost: u64,
    pub jitter_ms: u32,
}

/// Transport-facing half of a connection.
#[async_trait]
pub trait MediaChannel: Send + Sync {
    /// Bind local resources and return the local session description.
    /// Channels that produce no description return an empty string.
    async fn bind(&self, options: &crate::types::ConnectionOptions) -> Result<String>;

    /// Accept a remote session description.
    async fn set_remote_description(&self, sdp: &str) -> Result<()>;

    /// Current local session description, possibly renegotiated.
    async fn describe(&self) -> Result<String>;

    /// Apply transmit/receive flags.
    async fn update_mode(&self, flags: DirectionFlags) -> Result<()>;

    /// Enable or disable network loopback.
    async fn set_loopback(&self, enabled: bool) -> Result<()>;

    /// Link this channel to a peer channel.
    async fn join(&self, peer: Arc<dyn MediaChannel>) -> Result<()>;

    /// Unlink from the peer channel, if any.
    async fn unjoin(&self) -> Result<()>;

    fn is_joined(&self) -> bool;

    fn stats(&self) -> ChannelStats;

    /// Whether modes may only be applied after a join. True for local pair
    /// channels, false for channels facing a remote peer.
    fn requires_join(&self) -> bool;
}

/// Builds the media channel for a new connection.
pub trait ChannelProvider: Send + Sync {
    fn create_channel(&self, is_local: bool) -> Arc<dyn MediaChannel>;
}

/// Default provider: local pair channels for joined connections, SDP-bearing
/// remote channels otherwise. Ports are drawn from a simple even-numbered
/// sequence the way a transport allocator would hand them out.
pub struct DefaultChannelProvider {
    next_port: std::sync::atomic::AtomicU16,
}

impl DefaultChannelProvider {
    pub fn new() -> Self {
        Self { next_port: std::sync::atomic::AtomicU16::new(6000) }
    }
}

impl Default for DefaultChannelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelProvider for DefaultChannelProvider {
    fn create_channel(&self, is_local: bool) -> Arc<dyn MediaChannel> {
        if is_local {
            Arc::new(LocalChannel::new())
        } else {
            let port = self
                .next_port
                .fetch_add(2, std::sync::atomic::Ordering::SeqCst);
            Arc::new(RemoteChannel::new(port))
        }
    }
}
