//! Control-plane call registry.
//!
//! Tracks which (endpoint, connection) legs belong to each call id across the
//! whole gateway. The creation workflow registers legs as its final steps and
//! unregisters them on rollback; the delete workflows retire them. The
//! registry is bookkeeping only, it never owns the connections.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use mgw_endpoint_core::{CallId, ConnectionId};

/// One registered leg of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLeg {
    pub endpoint_id: String,
    pub connection_id: ConnectionId,
}

pub struct CallRegistry {
    calls: DashMap<CallId, Vec<CallLeg>>,
}

impl CallRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { calls: DashMap::new() })
    }

    pub fn register(&self, call_id: CallId, endpoint_id: &str, connection_id: ConnectionId) {
        debug!("registered connection {}@{} under call {}", connection_id, endpoint_id, call_id);
        self.calls.entry(call_id).or_default().push(CallLeg {
            endpoint_id: endpoint_id.to_string(),
            connection_id,
        });
    }

    /// Remove one leg. Returns false when the leg was not registered, which a
    /// compensating rollback treats as already done.
    pub fn unregister(&self, call_id: CallId, endpoint_id: &str, connection_id: ConnectionId) -> bool {
        let removed = match self.calls.get_mut(&call_id) {
            Some(mut legs) => {
                let before = legs.len();
                legs.retain(|leg| {
                    !(leg.endpoint_id == endpoint_id && leg.connection_id == connection_id)
                });
                before != legs.len()
            }
            None => false,
        };
        self.calls.remove_if(&call_id, |_, legs| legs.is_empty());
        removed
    }

    /// Drop every leg of one call.
    pub fn remove_call(&self, call_id: CallId) {
        self.calls.remove(&call_id);
    }

    /// Drop every leg registered against one endpoint, across all calls.
    pub fn remove_endpoint(&self, endpoint_id: &str) {
        for mut entry in self.calls.iter_mut() {
            entry.value_mut().retain(|leg| leg.endpoint_id != endpoint_id);
        }
        self.calls.retain(|_, legs| !legs.is_empty());
    }

    pub fn legs(&self, call_id: CallId) -> Vec<CallLeg> {
        self.calls.get(&call_id).map(|entry| entry.value().clone()).unwrap_or_default()
    }

    pub fn contains(&self, call_id: CallId) -> bool {
        self.calls.contains_key(&call_id)
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}
