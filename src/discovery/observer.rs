//! Presence observer for a single hub
//!
//! Follows the hub's attendant stream, keeps the attendant set, feeds the
//! discovery notifier and owns teardown of the hub link.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DiscoveryNotifier, HubSummary};
use crate::models::{
    AttendantEvent, DiscoveryEvent, HubClientError, HubClientResult, HubMetadata, InfoPatch,
    RpcError, StreamSeverity, TunnelAddress, tunnel_multiaddr,
};
use crate::peer::{AttendantStream, ConnectHandler, HubRpc, InboundTunnel, Network, TunnelStream};

/// Lifecycle of an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObserverState {
    /// Following the attendant stream
    Active,
    /// Subscription stopped, hub link still open
    Cancelled,
    /// Subscription stopped and hub link torn down
    Closed,
}

/// Collaborators shared by every observer of one peer
#[derive(Clone)]
pub struct ObserverContext {
    /// This peer's own identity
    pub local_pubkey: String,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<DiscoveryNotifier>,
}

/// Observer of one hub's attendance
pub struct HubObserver {
    inner: Arc<ObserverInner>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

struct ObserverInner {
    hub_pubkey: String,
    multiaddr: String,
    metadata: HubMetadata,
    rpc: Arc<dyn HubRpc>,
    on_connect: ConnectHandler,
    context: ObserverContext,
    attendants: Mutex<HashSet<String>>,
    state: Mutex<ObserverState>,
    connected_at: DateTime<Utc>,
}

impl HubObserver {
    /// Start observing a hub.
    ///
    /// Announces the link as a hub in the peer-info store when the hub sent
    /// any metadata, then follows `hub.attendants` in a background task.
    pub fn spawn(
        context: ObserverContext,
        hub_pubkey: impl Into<String>,
        multiaddr: impl Into<String>,
        metadata: HubMetadata,
        rpc: Arc<dyn HubRpc>,
        on_connect: ConnectHandler,
    ) -> Arc<Self> {
        let inner = Arc::new(ObserverInner {
            hub_pubkey: hub_pubkey.into(),
            multiaddr: multiaddr.into(),
            metadata,
            rpc,
            on_connect,
            context,
            attendants: Mutex::new(HashSet::new()),
            state: Mutex::new(ObserverState::Active),
            connected_at: Utc::now(),
        });

        if !inner.metadata.is_empty() {
            inner
                .context
                .network
                .update_info(&inner.multiaddr, InfoPatch::hub(&inner.metadata));
        }

        debug!("Announcing myself to hub {}", inner.hub_pubkey);
        let events = inner.rpc.attendants();
        let handle = tokio::spawn(Arc::clone(&inner).follow(events));

        Arc::new(Self {
            inner,
            subscription: Mutex::new(Some(handle)),
        })
    }

    pub fn pubkey(&self) -> &str {
        &self.inner.hub_pubkey
    }

    pub fn multiaddr(&self) -> &str {
        &self.inner.multiaddr
    }

    pub fn metadata(&self) -> &HubMetadata {
        &self.inner.metadata
    }

    pub fn rpc(&self) -> Arc<dyn HubRpc> {
        Arc::clone(&self.inner.rpc)
    }

    pub fn state(&self) -> ObserverState {
        *self.inner.state.lock()
    }

    /// Whether the hub link has not been torn down
    pub fn is_live(&self) -> bool {
        self.state() != ObserverState::Closed
    }

    /// Current attendants, sorted
    pub fn attendants(&self) -> Vec<String> {
        let mut attendants: Vec<String> = self.inner.attendants.lock().iter().cloned().collect();
        attendants.sort();
        attendants
    }

    pub fn summary(&self) -> HubSummary {
        HubSummary {
            pubkey: self.inner.hub_pubkey.clone(),
            multiaddr: self.inner.multiaddr.clone(),
            name: self.inner.metadata.name.clone(),
            admin: self.inner.metadata.admin.clone(),
            attendants: self.attendants(),
            state: self.state(),
            connected_at: self.inner.connected_at,
        }
    }

    /// Hand a stream the hub relayed from `origin` to the accept pipeline
    pub fn accept(&self, origin: &str, stream: TunnelStream) -> HubClientResult<()> {
        let address = TunnelAddress::new(self.inner.hub_pubkey.as_str(), origin)
            .map_err(|e| HubClientError::InvalidAddress(e.to_string()))?;
        debug!("handing tunnel {} to the accept pipeline", address);
        (self.inner.on_connect)(InboundTunnel { address, stream });
        Ok(())
    }

    /// Stop following the attendant stream. Leaves the hub link alone.
    pub fn cancel(&self) {
        if let Some(handle) = self.subscription.lock().take() {
            handle.abort();
        }
        let mut state = self.inner.state.lock();
        if *state == ObserverState::Active {
            *state = ObserverState::Cancelled;
        }
    }

    /// Cancel, forget every attendant's tunnel, close the RPC session and
    /// disconnect from the hub
    pub async fn close(&self) {
        self.cancel();
        self.inner.teardown().await;
    }
}

impl std::fmt::Debug for HubObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubObserver")
            .field("hub_pubkey", &self.inner.hub_pubkey)
            .field("multiaddr", &self.inner.multiaddr)
            .field("state", &self.state())
            .finish()
    }
}

impl ObserverInner {
    async fn follow(self: Arc<Self>, mut events: AttendantStream) {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => self.apply(event).await,
                Err(err) => {
                    self.stream_failed(err);
                    return;
                }
            }
        }
        debug!("attendants stream from hub {} ended", self.hub_pubkey);
    }

    async fn apply(&self, event: AttendantEvent) {
        match &event {
            AttendantEvent::State { pubkeys } => {
                debug!("initial attendants in {}: {:?}", self.hub_pubkey, pubkeys)
            }
            AttendantEvent::Joined { pubkey } => {
                debug!("attendant joined {}: {}", self.hub_pubkey, pubkey)
            }
            AttendantEvent::Left { pubkey } => {
                debug!("attendant left {}: {}", self.hub_pubkey, pubkey)
            }
        }

        let online_count = {
            let mut attendants = self.attendants.lock();
            match &event {
                AttendantEvent::State { pubkeys } => {
                    attendants.clear();
                    attendants.extend(pubkeys.iter().cloned());
                }
                AttendantEvent::Joined { pubkey } => {
                    attendants.insert(pubkey.clone());
                }
                AttendantEvent::Left { pubkey } => {
                    attendants.remove(pubkey);
                }
            }
            attendants.len()
        };

        self.context
            .network
            .update_info(&self.multiaddr, InfoPatch::online_count(online_count));

        match event {
            AttendantEvent::State { pubkeys } => {
                for pubkey in &pubkeys {
                    self.notify_new_attendant(pubkey);
                }
            }
            AttendantEvent::Joined { pubkey } => self.notify_new_attendant(&pubkey),
            AttendantEvent::Left { pubkey } => {
                let multiaddr = self.tunnel_multiaddr(&pubkey);
                debug!("Will disconnect and unstage {}", multiaddr);
                if let Err(e) = self.context.network.disconnect(&multiaddr).await {
                    debug!("failed to disconnect {}: {}", multiaddr, e);
                }
            }
        }
    }

    /// Publish a discovery event for a peer seen at this hub
    fn notify_new_attendant(&self, attendant: &str) {
        if attendant == self.hub_pubkey || attendant == self.context.local_pubkey {
            return;
        }
        self.context.notifier.notify(DiscoveryEvent {
            multiaddr: self.tunnel_multiaddr(attendant),
            attendant_pubkey: attendant.to_string(),
            hub_pubkey: self.hub_pubkey.clone(),
            hub_name: self.metadata.name.clone(),
        });
    }

    fn stream_failed(self: &Arc<Self>, err: RpcError) {
        let severity = err.severity();
        let failure = HubClientError::StreamTerminated {
            hub: self.hub_pubkey.clone(),
            severity,
            message: err.to_string(),
        };
        match severity {
            StreamSeverity::Terminated => {
                info!("{}, closing", failure);
                // Detached so that aborting the subscription cannot cut it short
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.teardown().await });
            }
            StreamSeverity::Network => warn!("{}", failure),
            StreamSeverity::Unexpected => error!("{}", failure),
        }
    }

    async fn teardown(&self) {
        {
            let mut state = self.state.lock();
            if *state == ObserverState::Closed {
                return;
            }
            *state = ObserverState::Closed;
        }

        let attendants: Vec<String> = self.attendants.lock().iter().cloned().collect();
        for pubkey in attendants {
            self.context.network.forget(&self.tunnel_multiaddr(&pubkey));
        }

        if let Err(e) = self.rpc.close().await {
            debug!("error when closing connection with hub {}: {}", self.hub_pubkey, e);
        }
        if let Err(e) = self.context.network.disconnect(&self.multiaddr).await {
            debug!("error when disconnecting from hub {}: {}", self.hub_pubkey, e);
        }
        debug!("closed observer for hub {}", self.hub_pubkey);
    }

    fn tunnel_multiaddr(&self, attendant: &str) -> String {
        tunnel_multiaddr(&self.hub_pubkey, attendant)
    }
}
