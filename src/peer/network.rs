//! Connection manager and stores the hub client relies on

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::HubRpc;
use crate::models::{InfoPatch, PeerInfo};

/// Kind of a connection lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEventKind {
    Connected,
    Disconnected,
}

/// Connection lifecycle event from the underlying transport
#[derive(Clone)]
pub struct ConnectionEvent {
    pub kind: ConnectionEventKind,
    /// Transport address of the connection
    pub address: String,
    /// Remote identity, once the handshake has revealed it
    pub pubkey: Option<String>,
    /// RPC handle, present once the connection is fully set up
    pub rpc: Option<Arc<dyn HubRpc>>,
}

impl ConnectionEvent {
    pub fn connected(
        address: impl Into<String>,
        pubkey: impl Into<String>,
        rpc: Arc<dyn HubRpc>,
    ) -> Self {
        Self {
            kind: ConnectionEventKind::Connected,
            address: address.into(),
            pubkey: Some(pubkey.into()),
            rpc: Some(rpc),
        }
    }

    pub fn disconnected(address: impl Into<String>, pubkey: impl Into<String>) -> Self {
        Self {
            kind: ConnectionEventKind::Disconnected,
            address: address.into(),
            pubkey: Some(pubkey.into()),
            rpc: None,
        }
    }
}

impl std::fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionEvent")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .field("pubkey", &self.pubkey)
            .field("has_rpc", &self.rpc.is_some())
            .finish()
    }
}

/// The peer's connection manager and peer-info store
#[async_trait]
pub trait Network: Send + Sync {
    /// Subscribe to connection lifecycle events
    fn listen(&self) -> BoxStream<'static, ConnectionEvent>;

    /// Dial a multiaddr, returning the RPC handle of the connected peer
    async fn connect(&self, multiaddr: &str) -> anyhow::Result<Arc<dyn HubRpc>>;

    /// Close a live connection
    async fn disconnect(&self, multiaddr: &str) -> anyhow::Result<()>;

    /// Drop any cached dial information for a multiaddr
    fn forget(&self, multiaddr: &str);

    /// Merge fields into the stored record for a multiaddr
    fn update_info(&self, multiaddr: &str, patch: InfoPatch);

    /// Every peer the network has a record for
    async fn peers(&self) -> anyhow::Result<Vec<(String, PeerInfo)>>;
}

/// Durable set of strings grouped by subdomain
#[async_trait]
pub trait PeerSet: Send + Sync {
    /// Add a value; returns false when it was already present
    async fn add(&self, subdomain: &str, value: &str) -> anyhow::Result<bool>;

    fn values(&self, subdomain: &str) -> Vec<String>;
}
