//! Hub capability probe

use tracing::debug;

use crate::models::{HubMetadata, RpcError};
use crate::peer::HubRpc;

/// Outcome of asking a freshly connected peer for `hub.metadata`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCapability {
    /// The peer is a hub and described itself
    Hub(HubMetadata),
    /// The peer does not serve the hub API; an ordinary peer
    NotHub,
    /// The call failed for some other reason
    Failed(RpcError),
}

/// Find out whether a peer is a hub
pub async fn probe_hub(rpc: &dyn HubRpc) -> HubCapability {
    match rpc.metadata().await {
        Ok(metadata) => HubCapability::Hub(metadata),
        Err(err) if err.is_missing_method() => {
            debug!("peer does not expose hub.metadata: {}", err);
            HubCapability::NotHub
        }
        Err(err) => HubCapability::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHub;

    #[tokio::test]
    async fn test_probe_outcomes() {
        let hub = MockHub::with_metadata(Ok(HubMetadata {
            name: Some("Plaza".to_string()),
            admin: None,
        }));
        assert!(matches!(probe_hub(hub.as_ref()).await, HubCapability::Hub(m) if m.name.as_deref() == Some("Plaza")));

        let plain = MockHub::with_metadata(Err(RpcError::method_not_allowed("hub.metadata")));
        assert_eq!(probe_hub(plain.as_ref()).await, HubCapability::NotHub);

        let broken = MockHub::with_metadata(Err(RpcError::new("ETIMEDOUT")));
        assert!(matches!(probe_hub(broken.as_ref()).await, HubCapability::Failed(_)));
    }
}
