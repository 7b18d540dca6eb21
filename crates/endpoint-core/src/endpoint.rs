//! Endpoint aggregate.
//!
//! An endpoint owns a concurrent map of calls, aggregates per-mode counters
//! across all of its connections and derives an active/inactive signal from
//! them. The counters are independent atomics updated by fetch-and-add;
//! reading them to decide activation is not linearizable across the three, and
//! does not need to be: only the converged boundary condition feeds the active
//! flag. Activation is strictly edge-triggered, and a redundant
//! activate/deactivate is an invariant violation, never a silent no-op.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::call::Call;
use crate::connection::Connection;
use crate::error::{EndpointError, Result};
use crate::media::{ChannelProvider, DefaultChannelProvider};
use crate::types::{CallId, ConnectionConfig, ConnectionId, ConnectionMode};

/// Lifecycle notifications published by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    Activated,
    Deactivated,
    /// A connection closed autonomously (timeout) and was dropped from its call.
    ConnectionClosed { call_id: CallId, connection_id: ConnectionId },
}

pub struct Endpoint {
    id: String,
    calls: DashMap<CallId, Arc<Call>>,
    read_count: AtomicI64,
    write_count: AtomicI64,
    loopback_count: AtomicI64,
    active: AtomicBool,
    next_connection_id: AtomicU32,
    provider: Arc<dyn ChannelProvider>,
    config: ConnectionConfig,
    event_tx: mpsc::UnboundedSender<EndpointEvent>,
    event_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<EndpointEvent>>>,
    weak: Weak<Endpoint>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Self::with_provider(id, Arc::new(DefaultChannelProvider::new()), ConnectionConfig::default())
    }

    pub fn with_provider(
        id: impl Into<String>,
        provider: Arc<dyn ChannelProvider>,
        config: ConnectionConfig,
    ) -> Arc<Self> {
        let id = id.into();
        Arc::new_cyclic(|weak| {
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            Self {
                id,
                calls: DashMap::new(),
                read_count: AtomicI64::new(0),
                write_count: AtomicI64::new(0),
                loopback_count: AtomicI64::new(0),
                active: AtomicBool::new(false),
                next_connection_id: AtomicU32::new(0),
                provider,
                config,
                event_tx,
                event_rx: parking_lot::Mutex::new(Some(event_rx)),
                weak: weak.clone(),
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> i64 {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> i64 {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn loopback_count(&self) -> i64 {
        self.loopback_count.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn has_call(&self, call_id: CallId) -> bool {
        self.calls.contains_key(&call_id)
    }

    /// Event receiver; can only be taken once.
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<EndpointEvent>> {
        self.event_rx.lock().take()
    }

    /// Look up or lazily create the call for `call_id`. Race-safe: when two
    /// callers race to create the same call id, exactly one `Call` survives.
    pub fn prepare_call(&self, call_id: CallId) -> Arc<Call> {
        self.calls
            .entry(call_id)
            .or_insert_with(|| Arc::new(Call::new(call_id)))
            .value()
            .clone()
    }

    /// Build a connection, register it under its call and apply the initial
    /// mode's counter contribution.
    pub fn create_connection(
        &self,
        call_id: CallId,
        initial_mode: ConnectionMode,
        is_local: bool,
    ) -> Result<Arc<Connection>> {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1);
        let channel = self.provider.create_channel(is_local);
        let connection = Connection::new(
            id,
            call_id,
            self.weak.clone(),
            self.id.clone(),
            is_local,
            initial_mode,
            channel,
            self.config,
        );
        let call = self.prepare_call(call_id);
        call.register(connection.clone());
        self.mode_updated(ConnectionMode::Inactive, initial_mode)?;
        info!(
            "endpoint {} created {} connection {} for call {}",
            self.id,
            if is_local { "local" } else { "remote" },
            connection.hex_id(),
            call_id
        );
        Ok(connection)
    }

    pub fn get_connection(&self, call_id: CallId, connection_id: ConnectionId) -> Result<Arc<Connection>> {
        let call = self
            .calls
            .get(&call_id)
            .map(|entry| entry.value().clone())
            .ok_or(EndpointError::CallNotFound(call_id))?;
        call.get(&connection_id)
            .ok_or(EndpointError::ConnectionNotFound { call: call_id, connection: connection_id })
    }

    /// Remove one connection from its call, reverse its counter contribution
    /// and close it. Removes the call when it becomes empty.
    pub async fn delete_connection(
        &self,
        call_id: CallId,
        connection_id: ConnectionId,
    ) -> Result<Arc<Connection>> {
        let call = self
            .calls
            .get(&call_id)
            .map(|entry| entry.value().clone())
            .ok_or(EndpointError::CallNotFound(call_id))?;
        let connection = call
            .remove(&connection_id)
            .ok_or(EndpointError::ConnectionNotFound { call: call_id, connection: connection_id })?;
        if call.is_empty() {
            self.calls.remove_if(&call_id, |_, c| c.is_empty());
        }
        self.mode_updated(connection.mode(), ConnectionMode::Inactive)?;
        connection.close().await?;
        info!("endpoint {} deleted connection {} of call {}", self.id, connection.hex_id(), call_id);
        Ok(connection)
    }

    /// Remove and close all connections of one call. Succeeds for a call that
    /// exists with zero connections; fails with `CallNotFound` for a call id
    /// that was never registered.
    pub async fn delete_connections(&self, call_id: CallId) -> Result<()> {
        let (_, call) = self
            .calls
            .remove(&call_id)
            .ok_or(EndpointError::CallNotFound(call_id))?;
        for connection in call.drain() {
            if let Err(e) = self.mode_updated(connection.mode(), ConnectionMode::Inactive) {
                error!("endpoint {} accounting failed deleting call {}: {}", self.id, call_id, e);
            }
            if let Err(e) = connection.close().await {
                warn!("endpoint {} failed closing connection {}: {}", self.id, connection.hex_id(), e);
            }
        }
        info!("endpoint {} deleted connections of call {}", self.id, call_id);
        Ok(())
    }

    /// Remove and close every connection across every call, leaving the
    /// endpoint inactive.
    pub async fn delete_all_connections(&self) {
        let call_ids: Vec<CallId> = self.calls.iter().map(|entry| *entry.key()).collect();
        for call_id in call_ids {
            // A concurrent delete may have raced us to the call; that is fine.
            let _ = self.delete_connections(call_id).await;
        }
    }

    /// Apply the signed counter deltas of a mode transition and, when a
    /// counter actually changed, re-evaluate the activation invariant:
    /// deactivate when any loopback exists or either direction count is zero,
    /// activate otherwise. Only a real edge invokes the strict primitives.
    pub fn mode_updated(&self, old: ConnectionMode, new: ConnectionMode) -> Result<()> {
        let delta = new.contribution() - old.contribution();
        if delta.is_zero() {
            return Ok(());
        }
        let read = self.read_count.fetch_add(delta.read as i64, Ordering::SeqCst) + delta.read as i64;
        let write = self.write_count.fetch_add(delta.write as i64, Ordering::SeqCst) + delta.write as i64;
        let loopback =
            self.loopback_count.fetch_add(delta.loopback as i64, Ordering::SeqCst) + delta.loopback as i64;
        let should_be_active = loopback == 0 && read > 0 && write > 0;
        if should_be_active == self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        if should_be_active {
            self.activate()
        } else {
            self.deactivate()
        }
    }

    /// Strict activation primitive: activating an already active endpoint is
    /// a bookkeeping bug and surfaces as an invariant violation.
    pub fn activate(&self) -> Result<()> {
        if self.active.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(EndpointError::InvariantViolation(format!(
                "endpoint {} is already active",
                self.id
            )));
        }
        info!("endpoint {} activated", self.id);
        let _ = self.event_tx.send(EndpointEvent::Activated);
        Ok(())
    }

    /// Strict deactivation primitive, mirror of [`Endpoint::activate`].
    pub fn deactivate(&self) -> Result<()> {
        if self.active.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(EndpointError::InvariantViolation(format!(
                "endpoint {} is already inactive",
                self.id
            )));
        }
        info!("endpoint {} deactivated", self.id);
        let _ = self.event_tx.send(EndpointEvent::Deactivated);
        Ok(())
    }

    /// A connection closed itself on timeout: drop it from its call and
    /// reverse its counter contribution.
    pub(crate) fn connection_expired(
        &self,
        call_id: CallId,
        connection_id: ConnectionId,
        last_mode: ConnectionMode,
    ) {
        let Some(call) = self.calls.get(&call_id).map(|entry| entry.value().clone()) else {
            return;
        };
        if call.remove(&connection_id).is_none() {
            return;
        }
        if call.is_empty() {
            self.calls.remove_if(&call_id, |_, c| c.is_empty());
        }
        if let Err(e) = self.mode_updated(last_mode, ConnectionMode::Inactive) {
            error!(
                "endpoint {} accounting failed after timeout of connection {}: {}",
                self.id, connection_id, e
            );
        }
        info!("endpoint {} dropped expired connection {} of call {}", self.id, connection_id, call_id);
        let _ = self.event_tx.send(EndpointEvent::ConnectionClosed { call_id, connection_id });
    }
}
