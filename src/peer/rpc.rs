//! RPC surface a hub exposes to its attendants

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::TunnelStream;
use crate::models::{AttendantEvent, HubMetadata, RpcError};

/// Ordered membership events from one hub
pub type AttendantStream = BoxStream<'static, Result<AttendantEvent, RpcError>>;

/// Live RPC handle to a remote peer that may be a hub.
///
/// Peers that are not hubs answer the `hub.*` methods with an error whose
/// message ends in "not in list of allowed methods".
#[async_trait]
pub trait HubRpc: Send + Sync {
    /// `hub.metadata`
    async fn metadata(&self) -> Result<HubMetadata, RpcError>;

    /// `hub.attendants`; the first item is the full roster
    fn attendants(&self) -> AttendantStream;

    /// `hub.createTunnel`: a byte stream relayed to `target`
    async fn create_tunnel(&self, target: &str) -> Result<TunnelStream, RpcError>;

    /// Close the RPC session with the peer
    async fn close(&self) -> Result<(), RpcError>;
}
