//! Call: the connections sharing one call identifier within an endpoint.

use dashmap::DashMap;
use std::sync::Arc;

use crate::connection::Connection;
use crate::types::{CallId, ConnectionId};

/// A call groups connections by call identifier. A call with zero connections
/// must not remain registered in its endpoint; the endpoint enforces that on
/// every removal.
pub struct Call {
    id: CallId,
    connections: DashMap<ConnectionId, Arc<Connection>>,
}

impl Call {
    pub(crate) fn new(id: CallId) -> Self {
        Self { id, connections: DashMap::new() }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub(crate) fn register(&self, connection: Arc<Connection>) {
        self.connections.insert(connection.id(), connection);
    }

    pub(crate) fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.remove(id).map(|(_, connection)| connection)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Remove and return every connection of this call.
    pub(crate) fn drain(&self) -> Vec<Arc<Connection>> {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter_map(|id| self.remove(&id)).collect()
    }
}
