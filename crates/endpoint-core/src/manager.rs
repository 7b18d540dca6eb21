//! Endpoint directory with namespace-based dynamic registration.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::endpoint::Endpoint;
use crate::error::{EndpointError, Result};
use crate::media::{ChannelProvider, DefaultChannelProvider};
use crate::types::ConnectionConfig;

/// How an endpoint identifier addresses the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    /// A concrete endpoint id.
    Specific(String),
    /// `namespace/$`: any instance of the namespace; the gateway picks one by
    /// registering a fresh endpoint under it.
    AnyInstance(String),
    /// `*` anywhere: the match-all wildcard, rejected by every command.
    All,
}

impl EndpointSpec {
    pub fn parse(id: &str) -> Self {
        let trimmed = id.trim();
        // A bare "$" names no namespace, so it is as unusable as "*".
        if trimmed == "$" || trimmed.split('/').any(|segment| segment == "*") {
            return EndpointSpec::All;
        }
        match trimmed.rsplit_once('/') {
            Some((namespace, "$")) => EndpointSpec::AnyInstance(namespace.to_string()),
            _ => EndpointSpec::Specific(trimmed.to_string()),
        }
    }
}

struct Namespace {
    provider: Arc<dyn ChannelProvider>,
    config: ConnectionConfig,
    next: AtomicU32,
}

/// Directory of endpoints plus the namespaces endpoints may be registered
/// under dynamically.
pub struct EndpointManager {
    endpoints: DashMap<String, Arc<Endpoint>>,
    namespaces: DashMap<String, Namespace>,
}

impl EndpointManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { endpoints: DashMap::new(), namespaces: DashMap::new() })
    }

    pub fn install(&self, endpoint: Arc<Endpoint>) {
        info!("installed endpoint {}", endpoint.id());
        self.endpoints.insert(endpoint.id().to_string(), endpoint);
    }

    pub fn install_namespace(&self, namespace: &str) {
        self.install_namespace_with(
            namespace,
            Arc::new(DefaultChannelProvider::new()),
            ConnectionConfig::default(),
        );
    }

    pub fn install_namespace_with(
        &self,
        namespace: &str,
        provider: Arc<dyn ChannelProvider>,
        config: ConnectionConfig,
    ) {
        info!("installed endpoint namespace {}", namespace);
        self.namespaces.insert(
            namespace.to_string(),
            Namespace { provider, config, next: AtomicU32::new(0) },
        );
    }

    pub fn get_endpoint(&self, id: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(id).map(|entry| entry.value().clone())
    }

    /// Mint a fresh endpoint under an installed namespace.
    pub fn register_endpoint(&self, namespace: &str) -> Result<Arc<Endpoint>> {
        let (id, endpoint) = {
            let ns = self
                .namespaces
                .get(namespace)
                .ok_or_else(|| EndpointError::UnrecognizedNamespace(namespace.to_string()))?;
            let n = ns.next.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("{}/{}", namespace, n);
            let endpoint = Endpoint::with_provider(&id, ns.provider.clone(), ns.config);
            (id, endpoint)
        };
        self.endpoints.insert(id.clone(), endpoint.clone());
        info!("registered endpoint {} under namespace {}", id, namespace);
        Ok(endpoint)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}
