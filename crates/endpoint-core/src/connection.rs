//! Connection state machine.
//!
//! A connection is one media leg with the explicit state machine
//! IDLE -> HALF_OPEN -> OPEN (-> CORRUPTED), with CLOSED terminal and
//! reachable from every other state. Events are processed one at a time under
//! the instance mutex, so re-entrant delivery can never interleave two
//! transitions. Entering HALF_OPEN or OPEN schedules a timeout; leaving either
//! state cancels it; an expired timer closes the connection autonomously and
//! tells the owning endpoint to drop it from its call.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{EndpointError, Result};
use crate::media::{ChannelStats, DirectionFlags, MediaChannel};
use crate::types::{CallId, ConnectionConfig, ConnectionId, ConnectionMode, ConnectionOptions, ConnectionState};

struct PeerLink {
    id: ConnectionId,
    connection: Weak<Connection>,
}

struct Inner {
    state: ConnectionState,
    mode: ConnectionMode,
    local_sdp: String,
    remote_sdp: String,
    peer: Option<PeerLink>,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
}

pub struct Connection {
    id: ConnectionId,
    call_id: CallId,
    endpoint_id: String,
    is_local: bool,
    endpoint: Weak<Endpoint>,
    channel: Arc<dyn MediaChannel>,
    config: ConnectionConfig,
    weak: Weak<Connection>,
    // Shadows kept in sync with `inner` so state and mode read without awaiting.
    state: RwLock<ConnectionState>,
    mode: RwLock<ConnectionMode>,
    inner: tokio::sync::Mutex<Inner>,
}

impl Connection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ConnectionId,
        call_id: CallId,
        endpoint: Weak<Endpoint>,
        endpoint_id: String,
        is_local: bool,
        initial_mode: ConnectionMode,
        channel: Arc<dyn MediaChannel>,
        config: ConnectionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id,
            call_id,
            endpoint_id,
            is_local,
            endpoint,
            channel,
            config,
            weak: weak.clone(),
            state: RwLock::new(ConnectionState::Idle),
            mode: RwLock::new(initial_mode),
            inner: tokio::sync::Mutex::new(Inner {
                state: ConnectionState::Idle,
                mode: initial_mode,
                local_sdp: String::new(),
                remote_sdp: String::new(),
                peer: None,
                timer: None,
                timer_generation: 0,
            }),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Connection identifier in its hexadecimal wire form.
    pub fn hex_id(&self) -> String {
        self.id.to_string()
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn mode(&self) -> ConnectionMode {
        *self.mode.read()
    }

    pub fn stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    pub async fn local_description(&self) -> String {
        self.inner.lock().await.local_sdp.clone()
    }

    pub async fn remote_description(&self) -> String {
        self.inner.lock().await.remote_sdp.clone()
    }

    pub async fn peer_id(&self) -> Option<ConnectionId> {
        self.inner.lock().await.peer.as_ref().map(|link| link.id)
    }

    /// Allocate a provisional local description and move IDLE -> HALF_OPEN.
    pub async fn half_open(&self, options: &ConnectionOptions) -> Result<String> {
        let mut inner = self.inner.lock().await;
        if inner.state != ConnectionState::Idle {
            return Err(EndpointError::InvalidTransition { state: inner.state, event: "half_open" });
        }
        let sdp = match self.channel.bind(options).await {
            Ok(sdp) => sdp,
            Err(e) => {
                self.corrupt(&mut inner);
                return Err(e);
            }
        };
        inner.local_sdp = sdp.clone();
        self.set_state(&mut inner, ConnectionState::HalfOpen);
        self.schedule_timeout(&mut inner, self.config.half_open_timeout);
        Ok(sdp)
    }

    /// Move IDLE or HALF_OPEN -> OPEN, optionally accepting a remote
    /// description, and return the (possibly renegotiated) local description.
    pub async fn open(&self, remote_sdp: Option<&str>, options: &ConnectionOptions) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let was_idle = match inner.state {
            ConnectionState::Idle => true,
            ConnectionState::HalfOpen => false,
            state => return Err(EndpointError::InvalidTransition { state, event: "open" }),
        };
        self.cancel_timer(&mut inner);
        let result = async {
            if was_idle {
                inner.local_sdp = self.channel.bind(options).await?;
            }
            if let Some(sdp) = remote_sdp {
                self.channel.set_remote_description(sdp).await?;
                inner.remote_sdp = sdp.to_string();
                inner.local_sdp = self.channel.describe().await?;
            }
            Ok(inner.local_sdp.clone())
        }
        .await;
        match result {
            Ok(sdp) => {
                self.set_state(&mut inner, ConnectionState::Open);
                self.schedule_timeout(&mut inner, self.config.open_timeout);
                Ok(sdp)
            }
            Err(e) => {
                self.corrupt(&mut inner);
                Err(e)
            }
        }
    }

    /// Update the remote description of an OPEN connection; stays OPEN.
    pub async fn renegotiate(&self, sdp: &str) -> Result<String> {
        let mut inner = self.inner.lock().await;
        if inner.state != ConnectionState::Open {
            return Err(EndpointError::InvalidTransition { state: inner.state, event: "renegotiate" });
        }
        let result = async {
            self.channel.set_remote_description(sdp).await?;
            inner.remote_sdp = sdp.to_string();
            inner.local_sdp = self.channel.describe().await?;
            Ok(inner.local_sdp.clone())
        }
        .await;
        match result {
            Ok(local) => Ok(local),
            Err(e) => {
                self.corrupt(&mut inner);
                Err(e)
            }
        }
    }

    /// Apply a new mode. A no-op when the mode is unchanged. Local pair
    /// connections must be joined first; loopback is refused on any
    /// connection that is (or must be) joined to a peer.
    pub async fn update_mode(&self, mode: ConnectionMode) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            ConnectionState::HalfOpen | ConnectionState::Open => {}
            state => return Err(EndpointError::InvalidTransition { state, event: "update_mode" }),
        }
        if mode == inner.mode {
            return Ok(());
        }
        if mode == ConnectionMode::NetworkLoopback
            && (self.channel.requires_join() || inner.peer.is_some())
        {
            return Err(EndpointError::ModeNotSupported(mode));
        }
        if self.channel.requires_join() && inner.peer.is_none() {
            return Err(EndpointError::NotJoined);
        }
        if let Err(e) = self.apply_mode(inner.mode, mode).await {
            self.corrupt(&mut inner);
            return Err(e);
        }
        let old = inner.mode;
        self.set_mode(&mut inner, mode);
        drop(inner);
        if let Some(endpoint) = self.endpoint.upgrade() {
            endpoint.mode_updated(old, mode)?;
        }
        Ok(())
    }

    async fn apply_mode(&self, old: ConnectionMode, new: ConnectionMode) -> Result<()> {
        if new == ConnectionMode::NetworkLoopback {
            self.channel.set_loopback(true).await?;
            self.channel.update_mode(DirectionFlags::default()).await?;
        } else {
            if old == ConnectionMode::NetworkLoopback {
                self.channel.set_loopback(false).await?;
            }
            self.channel.update_mode(DirectionFlags::from(new)).await?;
        }
        Ok(())
    }

    /// Link this connection's media channel to `peer`'s. Both sides must be
    /// OPEN and unjoined; the link is symmetric.
    pub async fn join(self: &Arc<Self>, peer: &Arc<Connection>) -> Result<()> {
        if Arc::ptr_eq(self, peer) {
            return Err(EndpointError::Channel("cannot join a connection to itself".to_string()));
        }
        // Stable lock order avoids a deadlock with a concurrent reverse join.
        let (first, second) = if Arc::as_ptr(self) as usize <= Arc::as_ptr(peer) as usize {
            (self.clone(), peer.clone())
        } else {
            (peer.clone(), self.clone())
        };
        let mut a = first.inner.lock().await;
        let mut b = second.inner.lock().await;
        if a.state != ConnectionState::Open {
            return Err(EndpointError::InvalidTransition { state: a.state, event: "join" });
        }
        if b.state != ConnectionState::Open {
            return Err(EndpointError::InvalidTransition { state: b.state, event: "join" });
        }
        if a.peer.is_some() || b.peer.is_some() {
            return Err(EndpointError::AlreadyJoined);
        }
        first.channel.join(second.channel.clone()).await?;
        if let Err(e) = second.channel.join(first.channel.clone()).await {
            let _ = first.channel.unjoin().await;
            return Err(e);
        }
        a.peer = Some(PeerLink { id: second.id, connection: Arc::downgrade(&second) });
        b.peer = Some(PeerLink { id: first.id, connection: Arc::downgrade(&first) });
        info!(
            "joined connection {}@{} with {}@{}",
            first.hex_id(),
            first.endpoint_id,
            second.hex_id(),
            second.endpoint_id
        );
        Ok(())
    }

    /// Cancel timers, unjoin if joined and move to CLOSED. Closing an already
    /// closed connection is a no-op, which keeps rollback cleanup idempotent.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Closed {
            return Ok(());
        }
        self.cancel_timer(&mut inner);
        let peer = inner.peer.take();
        if peer.is_some() {
            if let Err(e) = self.channel.unjoin().await {
                warn!("connection {} failed to unjoin while closing: {}", self.hex_id(), e);
            }
        }
        self.set_state(&mut inner, ConnectionState::Closed);
        drop(inner);
        if let Some(link) = peer {
            if let Some(other) = link.connection.upgrade() {
                other.peer_detached().await;
            }
        }
        Ok(())
    }

    /// The peer side of a join was closed underneath us.
    async fn peer_detached(&self) {
        let mut inner = self.inner.lock().await;
        if inner.peer.take().is_some() {
            if let Err(e) = self.channel.unjoin().await {
                warn!("connection {} failed to unjoin after peer close: {}", self.hex_id(), e);
            }
        }
    }

    /// A half-open or open timeout fired. The generation check resolves the
    /// race against an explicit transition: a superseded timer never
    /// resurrects a connection that has already moved on.
    async fn expire(&self, generation: u64) {
        let mut inner = self.inner.lock().await;
        if generation != inner.timer_generation {
            return;
        }
        match inner.state {
            ConnectionState::HalfOpen | ConnectionState::Open => {}
            _ => return,
        }
        debug!(
            "connection {}@{} timed out in {}",
            self.hex_id(),
            self.endpoint_id,
            inner.state
        );
        inner.timer = None;
        let peer = inner.peer.take();
        if peer.is_some() {
            let _ = self.channel.unjoin().await;
        }
        let last_mode = inner.mode;
        self.set_state(&mut inner, ConnectionState::Closed);
        drop(inner);
        if let Some(link) = peer {
            if let Some(other) = link.connection.upgrade() {
                other.peer_detached().await;
            }
        }
        if let Some(endpoint) = self.endpoint.upgrade() {
            endpoint.connection_expired(self.call_id, self.id, last_mode);
        }
    }

    fn schedule_timeout(&self, inner: &mut Inner, duration: Duration) {
        self.cancel_timer(inner);
        inner.timer_generation += 1;
        let generation = inner.timer_generation;
        let weak = self.weak.clone();
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(connection) = weak.upgrade() {
                connection.expire(generation).await;
            }
        }));
    }

    fn cancel_timer(&self, inner: &mut Inner) {
        if let Some(handle) = inner.timer.take() {
            handle.abort();
        }
        // A timer that fired but has not yet acquired the lock loses here.
        inner.timer_generation += 1;
    }

    /// A transition's action failed mid-flight: the machine must not stay
    /// stuck, so it lands in CORRUPTED, from where only `close` applies.
    fn corrupt(&self, inner: &mut Inner) {
        self.cancel_timer(inner);
        self.set_state(inner, ConnectionState::Corrupted);
        warn!("connection {}@{} failed mid-transition, marked corrupted", self.hex_id(), self.endpoint_id);
    }

    fn set_state(&self, inner: &mut Inner, next: ConnectionState) {
        debug!(
            "connection {}@{} state {} -> {}",
            self.hex_id(),
            self.endpoint_id,
            inner.state,
            next
        );
        inner.state = next;
        *self.state.write() = next;
    }

    fn set_mode(&self, inner: &mut Inner, mode: ConnectionMode) {
        debug!(
            "connection {}@{} mode {} -> {}",
            self.hex_id(),
            self.endpoint_id,
            inner.mode,
            mode
        );
        inner.mode = mode;
        *self.mode.write() = mode;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.get_mut().timer.take() {
            handle.abort();
        }
    }
}
