//! Hub client
//!
//! Ties the registry, transport and discovery notifier together and exposes
//! the operations the rest of the peer uses: adding and ranking hubs,
//! bridging inbound tunnel requests, and subscribing to discovered
//! attendants.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ClientSettings;
use crate::discovery::{DiscoveryNotifier, DiscoveryStream, HubRegistry, HubSummary, ObserverContext};
use crate::metrics;
use crate::models::{normalize_hub_multiaddr, HubClientError, HubClientResult, PeerInfo};
use crate::peer::{ConnectHandler, Network, PeerSet, RefusedStream, TunnelConnection, TunnelStream};
use crate::transport::{TunnelServer, TunnelTransport};

/// Failure count assumed for a hub the network has no statistics for
pub const DEFAULT_FAILURE_COUNT: u32 = 1;

/// Client side of the hub protocol for one peer
pub struct HubClient {
    settings: ClientSettings,
    network: Arc<dyn Network>,
    peer_set: Arc<dyn PeerSet>,
    registry: HubRegistry,
    notifier: Arc<DiscoveryNotifier>,
    transport: Arc<TunnelTransport>,
    server: Mutex<Option<TunnelServer>>,
}

impl HubClient {
    /// Create a hub client for the peer identified by `local_pubkey`
    pub fn new(
        settings: ClientSettings,
        local_pubkey: impl Into<String>,
        network: Arc<dyn Network>,
        peer_set: Arc<dyn PeerSet>,
    ) -> Self {
        let registry = HubRegistry::new();
        let notifier = Arc::new(DiscoveryNotifier::new());
        let context = ObserverContext {
            local_pubkey: local_pubkey.into(),
            network: Arc::clone(&network),
            notifier: Arc::clone(&notifier),
        };
        let transport = Arc::new(TunnelTransport::new(
            settings.clone(),
            context,
            registry.clone(),
        ));

        Self {
            settings,
            network,
            peer_set,
            registry,
            notifier,
            transport,
            server: Mutex::new(None),
        }
    }

    /// Get the tunnel transport
    pub fn transport(&self) -> &Arc<TunnelTransport> {
        &self.transport
    }

    /// Get the hub registry
    pub fn registry(&self) -> &HubRegistry {
        &self.registry
    }

    /// Start accepting: observe hubs as they connect and hand tunnels they
    /// relay to `on_connect`
    pub fn start(&self, on_connect: ConnectHandler) -> HubClientResult<()> {
        let mut server = self.server.lock();
        if server.is_some() {
            return Err(HubClientError::Internal(
                "tunnel transport already listening".to_string(),
            ));
        }
        if self.notifier.is_ended() {
            return Err(HubClientError::Internal("hub client is closed".to_string()));
        }
        *server = Some(self.transport.listen(on_connect));
        Ok(())
    }

    /// Open a tunnel to `tunnel:<hub>:<target>`
    pub async fn dial(&self, address: &str) -> HubClientResult<TunnelConnection> {
        self.transport.dial(address).await
    }

    // ========================================================================
    // Hub registry operations
    // ========================================================================

    /// Remember a hub and connect to it.
    ///
    /// The invite token, if any, is stripped before the address is stored,
    /// but the connection itself uses the address as given.
    pub async fn add_hub(&self, multiaddr: &str) -> HubClientResult<()> {
        let subdomain = &self.settings.hubs_subdomain;
        let normalized = normalize_hub_multiaddr(multiaddr);

        if self.peer_set.values(subdomain).contains(&normalized) {
            debug!("hub {} already in peer set", normalized);
        } else {
            self.peer_set.add(subdomain, &normalized).await.map_err(|e| {
                HubClientError::PeerSet(format!("Failed to add hub to peer set: {}", e))
            })?;
            info!("added hub {}", normalized);
        }

        self.network.connect(multiaddr).await.map_err(|e| {
            HubClientError::Network(format!(
                "Failed to connect to hub after adding it to peer set: {}",
                e
            ))
        })?;
        Ok(())
    }

    /// Up to `limit` known hub multiaddrs, fewest connection failures first
    pub async fn get_hubs(&self, limit: usize) -> HubClientResult<Vec<String>> {
        let peers = self
            .network
            .peers()
            .await
            .map_err(|e| HubClientError::Network(format!("Failed to get hubs: {}", e)))?;
        let info: HashMap<String, PeerInfo> = peers.into_iter().collect();

        let mut hubs: Vec<(String, u32)> = self
            .peer_set
            .values(&self.settings.hubs_subdomain)
            .into_iter()
            .map(|multiaddr| {
                let failure = info
                    .get(&multiaddr)
                    .and_then(PeerInfo::failure)
                    .unwrap_or(DEFAULT_FAILURE_COUNT);
                (multiaddr, failure)
            })
            .collect();

        // Stable, so equally reliable hubs keep their stored order
        hubs.sort_by_key(|(_, failure)| *failure);
        hubs.truncate(limit);
        Ok(hubs.into_iter().map(|(multiaddr, _)| multiaddr).collect())
    }

    /// Serve `hubClient.connect`, called by hub `hub_pubkey` on behalf of
    /// `origin`.
    ///
    /// Returns one end of an in-process pair whose other end goes to the
    /// accept pipeline, or a stream that fails on first use when the request
    /// cannot be served.
    pub fn connect(&self, hub_pubkey: &str, origin: &str) -> TunnelStream {
        debug!("received hubClient.connect({}) via hub {}", origin, hub_pubkey);

        if let Some(observer) = self.registry.get(hub_pubkey).filter(|_| !origin.is_empty()) {
            let (inbound, outbound) = tokio::io::duplex(self.settings.bridge_buffer_bytes);
            if observer.accept(origin, Box::new(inbound)).is_ok() {
                metrics::record_bridged();
                return Box::new(outbound);
            }
        }

        metrics::record_bridge_refused();
        let refusal = HubClientError::bridge_refused(origin, hub_pubkey);
        Box::new(RefusedStream::new(refusal.to_string()))
    }

    /// Subscribe to attendants discovered at any hub
    pub fn discovered_attendants(&self) -> DiscoveryStream {
        self.notifier.listen()
    }

    /// Snapshot of every observed hub
    pub fn hubs(&self) -> Vec<HubSummary> {
        self.registry.list()
    }

    /// Shut down: close the transport and every hub observer, then end all
    /// discovery subscriptions. Safe to call more than once.
    pub async fn close(&self) {
        let server = self.server.lock().take();
        if let Some(server) = server {
            server.close().await;
        }
        if self.notifier.end() {
            info!("hub client closed");
        }
    }
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("hubs", &self.registry.len())
            .field("listening", &self.server.lock().is_some())
            .finish()
    }
}
