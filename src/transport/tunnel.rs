//! Transport for `tunnel:<hub>:<target>` addresses
//!
//! The accept side watches the connection lifecycle, recognises hubs and
//! keeps one [`HubObserver`] per hub. The dial side opens tunnels through
//! whichever observed hub the address names.

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::{probe_hub, HubCapability};
use crate::config::ClientSettings;
use crate::discovery::{HubObserver, HubRegistry, ObserverContext};
use crate::metrics;
use crate::models::{is_tunnel_address, HubClientError, HubClientResult, TunnelAddress, TUNNEL_SCHEME};
use crate::peer::{ConnectHandler, ConnectionEvent, ConnectionEventKind, HubRpc, TunnelConnection};

/// Tunnel transport
pub struct TunnelTransport {
    settings: ClientSettings,
    context: ObserverContext,
    registry: HubRegistry,
}

impl TunnelTransport {
    /// Create a transport sharing `registry` with the rest of the client
    pub fn new(settings: ClientSettings, context: ObserverContext, registry: HubRegistry) -> Self {
        Self {
            settings,
            context,
            registry,
        }
    }

    /// Scheme this transport handles
    pub fn name(&self) -> &'static str {
        TUNNEL_SCHEME
    }

    pub fn registry(&self) -> &HubRegistry {
        &self.registry
    }

    /// Parse an address this transport can dial
    pub fn parse(&self, address: &str) -> Option<TunnelAddress> {
        TunnelAddress::parse(address)
    }

    // ========================================================================
    // Accept
    // ========================================================================

    /// Start watching the connection lifecycle. Inbound tunnels relayed by
    /// observed hubs are handed to `on_connect`.
    pub fn listen(self: &Arc<Self>, on_connect: ConnectHandler) -> TunnelServer {
        let mut events = self.context.network.listen();
        let transport = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut probes = JoinSet::new();
            loop {
                tokio::select! {
                    event = events.next() => {
                        let Some(event) = event else { break };
                        match event.kind {
                            ConnectionEventKind::Connected => {
                                let transport = Arc::clone(&transport);
                                let on_connect = Arc::clone(&on_connect);
                                probes.spawn(async move {
                                    transport.handle_connected(event, on_connect).await
                                });
                            }
                            ConnectionEventKind::Disconnected => {
                                transport.handle_disconnected(event).await
                            }
                        }
                    }
                    Some(_) = probes.join_next(), if !probes.is_empty() => {}
                }
            }
            while probes.join_next().await.is_some() {}
            debug!("connection lifecycle stream ended");
        });

        TunnelServer {
            registry: self.registry.clone(),
            task,
        }
    }

    async fn handle_connected(&self, event: ConnectionEvent, on_connect: ConnectHandler) {
        let Some(pubkey) = event.pubkey else { return };
        if self.registry.contains(&pubkey) {
            return;
        }
        let Some(rpc) = event.rpc else { return };
        // Relayed connections are never hubs themselves
        if is_tunnel_address(&event.address) {
            return;
        }

        let metadata = match probe_hub(rpc.as_ref()).await {
            HubCapability::Hub(metadata) => metadata,
            HubCapability::NotHub => return,
            HubCapability::Failed(err) => {
                warn!("failure when calling hub.metadata on {}: {}", pubkey, err);
                return;
            }
        };

        info!("connected to hub {}", pubkey);
        let observer = HubObserver::spawn(
            self.context.clone(),
            pubkey,
            event.address,
            metadata,
            rpc,
            on_connect,
        );
        if let Some(previous) = self.registry.register(observer) {
            debug!("replaced observer for hub {}", previous.pubkey());
        }
    }

    async fn handle_disconnected(&self, event: ConnectionEvent) {
        let Some(pubkey) = event.pubkey else { return };
        if let Some(observer) = self.registry.remove(&pubkey) {
            info!("hub {} disconnected", pubkey);
            observer.close().await;
        }
    }

    // ========================================================================
    // Dial
    // ========================================================================

    /// Open a tunnel to an address of the form `tunnel:<hub>:<target>`
    pub async fn dial(&self, address: &str) -> HubClientResult<TunnelConnection> {
        debug!("we wish to connect to {}", address);
        match TunnelAddress::parse(address) {
            Some(parsed) => self.dial_address(&parsed).await,
            None => {
                metrics::record_tunnel_dial_failure();
                Err(HubClientError::InvalidAddress(address.to_string()))
            }
        }
    }

    /// Open a tunnel to an already parsed address
    pub async fn dial_address(&self, address: &TunnelAddress) -> HubClientResult<TunnelConnection> {
        let result = self.open_tunnel(address).await;
        match &result {
            Ok(_) => metrics::record_tunnel_dialed(),
            Err(e) => {
                metrics::record_tunnel_dial_failure();
                debug!("failed to open {}: {}", address, e);
            }
        }
        result
    }

    async fn open_tunnel(&self, address: &TunnelAddress) -> HubClientResult<TunnelConnection> {
        let rpc = self
            .resolve_hub(address.hub())
            .await
            .ok_or_else(|| HubClientError::hub_unreachable(address.hub(), address.to_string()))?;

        debug!("will call createTunnel with {} via hub {}", address.target(), address.hub());
        let stream = rpc.create_tunnel(address.target()).await?;
        Ok(TunnelConnection::new(address.clone(), stream))
    }

    /// Find the RPC handle of an observed hub, waiting once for a link that
    /// may still be handshaking
    async fn resolve_hub(&self, hub: &str) -> Option<Arc<dyn HubRpc>> {
        if let Some(rpc) = self.registry.rpc(hub) {
            return Some(rpc);
        }
        let delay = self.settings.hub_resolve_delay();
        debug!("hub {} not observed yet, checking again in {:?}", hub, delay);
        tokio::time::sleep(delay).await;
        self.registry.rpc(hub)
    }
}

/// Running accept side of the transport
pub struct TunnelServer {
    registry: HubRegistry,
    task: JoinHandle<()>,
}

impl TunnelServer {
    /// Stop watching connections, close every hub observer and clear the
    /// registry
    pub async fn close(self) {
        self.task.abort();
        for observer in self.registry.drain() {
            observer.close().await;
        }
        debug!("tunnel transport closed");
    }
}

impl std::fmt::Debug for TunnelServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelServer")
            .field("hubs", &self.registry.len())
            .finish()
    }
}
