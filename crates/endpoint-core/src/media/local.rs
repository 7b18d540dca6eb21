//! Joinable pair channel for connections between two local endpoints.
//!
//! Local channels produce no session description; traffic flows only once the
//! channel has been joined to its peer, so mode updates on an unjoined local
//! channel are rejected.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{EndpointError, Result};
use crate::types::{ConnectionMode, ConnectionOptions};

use super::{ChannelStats, DirectionFlags, MediaChannel};

pub struct LocalChannel {
    joined: Mutex<bool>,
    flags: Mutex<DirectionFlags>,
    stats: Mutex<ChannelStats>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            joined: Mutex::new(false),
            flags: Mutex::new(DirectionFlags::default()),
            stats: Mutex::new(ChannelStats::default()),
        }
    }

    pub fn flags(&self) -> DirectionFlags {
        *self.flags.lock()
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaChannel for LocalChannel {
    async fn bind(&self, _options: &ConnectionOptions) -> Result<String> {
        Ok(String::new())
    }

    async fn set_remote_description(&self, _sdp: &str) -> Result<()> {
        Err(EndpointError::UnsupportedDescription)
    }

    async fn describe(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn update_mode(&self, flags: DirectionFlags) -> Result<()> {
        if !*self.joined.lock() {
            return Err(EndpointError::NotJoined);
        }
        *self.flags.lock() = flags;
        Ok(())
    }

    async fn set_loopback(&self, _enabled: bool) -> Result<()> {
        Err(EndpointError::ModeNotSupported(ConnectionMode::NetworkLoopback))
    }

    async fn join(&self, _peer: Arc<dyn MediaChannel>) -> Result<()> {
        let mut joined = self.joined.lock();
        if *joined {
            return Err(EndpointError::AlreadyJoined);
        }
        *joined = true;
        Ok(())
    }

    async fn unjoin(&self) -> Result<()> {
        *self.joined.lock() = false;
        *self.flags.lock() = DirectionFlags::default();
        Ok(())
    }

    fn is_joined(&self) -> bool {
        *self.joined.lock()
    }

    fn stats(&self) -> ChannelStats {
        *self.stats.lock()
    }

    fn requires_join(&self) -> bool {
        true
    }
}
