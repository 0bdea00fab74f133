//! Registry of hubs under observation

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{HubObserver, ObserverState};
use crate::metrics;
use crate::peer::HubRpc;

/// Snapshot of one observed hub
#[derive(Debug, Clone, Serialize)]
pub struct HubSummary {
    pub pubkey: String,
    pub multiaddr: String,
    pub name: Option<String>,
    pub admin: Option<String>,
    pub attendants: Vec<String>,
    pub state: ObserverState,
    pub connected_at: DateTime<Utc>,
}

/// Table of hub observers keyed by hub pubkey.
///
/// Holds at most one observer per hub. Locks cover a single lookup or
/// insert/evict and are never held across an await.
#[derive(Debug, Clone, Default)]
pub struct HubRegistry {
    hubs: Arc<RwLock<HashMap<String, Arc<HubObserver>>>>,
}

impl HubRegistry {
    /// Create an empty hub registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer, cancelling and evicting any previous one for
    /// the same hub. Returns the evicted observer.
    pub fn register(&self, observer: Arc<HubObserver>) -> Option<Arc<HubObserver>> {
        let mut hubs = self.hubs.write();
        let previous = hubs.remove(observer.pubkey());
        if let Some(ref old) = previous {
            old.cancel();
        }
        hubs.insert(observer.pubkey().to_string(), observer);
        metrics::set_hubs_observed(hubs.len());
        previous
    }

    pub fn contains(&self, pubkey: &str) -> bool {
        self.hubs.read().contains_key(pubkey)
    }

    /// Get a hub observer by pubkey
    pub fn get(&self, pubkey: &str) -> Option<Arc<HubObserver>> {
        self.hubs.read().get(pubkey).cloned()
    }

    /// RPC handle of a hub whose link is still open
    pub fn rpc(&self, pubkey: &str) -> Option<Arc<dyn HubRpc>> {
        self.hubs
            .read()
            .get(pubkey)
            .filter(|observer| observer.is_live())
            .map(|observer| observer.rpc())
    }

    /// Remove a hub observer, returning it for teardown
    pub fn remove(&self, pubkey: &str) -> Option<Arc<HubObserver>> {
        let mut hubs = self.hubs.write();
        let removed = hubs.remove(pubkey);
        metrics::set_hubs_observed(hubs.len());
        removed
    }

    /// Empty the registry, returning every observer it held
    pub fn drain(&self) -> Vec<Arc<HubObserver>> {
        let mut hubs = self.hubs.write();
        let drained = hubs.drain().map(|(_, observer)| observer).collect();
        metrics::set_hubs_observed(0);
        drained
    }

    pub fn len(&self) -> usize {
        self.hubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hubs.read().is_empty()
    }

    /// Get all hubs, ordered by pubkey
    pub fn list(&self) -> Vec<HubSummary> {
        let mut list: Vec<HubSummary> = self
            .hubs
            .read()
            .values()
            .map(|observer| observer.summary())
            .collect();
        list.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{observer_context, MockHub};

    #[tokio::test]
    async fn test_register_and_lookup() {
        let (context, _network) = observer_context("L");
        let registry = HubRegistry::new();
        let hub = MockHub::new();

        let observer = HubObserver::spawn(
            context,
            "H",
            "net:hub:8008~shse:H",
            Default::default(),
            hub.clone(),
            crate::testing::ignore_inbound(),
        );
        assert!(registry.register(observer).is_none());

        assert!(registry.contains("H"));
        assert!(registry.rpc("H").is_some());
        assert!(registry.rpc("X").is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].multiaddr, "net:hub:8008~shse:H");

        let removed = registry.remove("H").unwrap();
        assert_eq!(removed.pubkey(), "H");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_register_evicts_and_cancels_previous() {
        let (context, _network) = observer_context("L");
        let registry = HubRegistry::new();

        let first = HubObserver::spawn(
            context.clone(),
            "H",
            "addr-1",
            Default::default(),
            MockHub::new(),
            crate::testing::ignore_inbound(),
        );
        let second = HubObserver::spawn(
            context,
            "H",
            "addr-2",
            Default::default(),
            MockHub::new(),
            crate::testing::ignore_inbound(),
        );

        registry.register(first);
        let evicted = registry.register(second).unwrap();

        assert_eq!(evicted.multiaddr(), "addr-1");
        assert_eq!(evicted.state(), ObserverState::Cancelled);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("H").unwrap().multiaddr(), "addr-2");
    }

    #[tokio::test]
    async fn test_closed_hub_has_no_rpc() {
        let (context, _network) = observer_context("L");
        let registry = HubRegistry::new();
        let observer = HubObserver::spawn(
            context,
            "H",
            "addr",
            Default::default(),
            MockHub::new(),
            crate::testing::ignore_inbound(),
        );
        registry.register(observer.clone());

        observer.close().await;
        assert!(registry.contains("H"));
        assert!(registry.rpc("H").is_none());

        assert_eq!(registry.drain().len(), 1);
        assert!(registry.is_empty());
    }
}
