//! The `hub` RPC surface as exposed by a client.
//!
//! Clients register the same method names as a hub so the manifests line
//! up, but only hubs serve them. Every call fails.

use futures::stream::{self, StreamExt};

use super::{AttendantStream, RefusedStream};
use crate::models::{HubMetadata, RpcError};

pub const NOT_IMPLEMENTED_ON_CLIENT: &str = "Not implemented on the client";

/// Calling convention of a manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Sync,
    Async,
    Source,
    Duplex,
}

/// Method names and kinds of the `hub` namespace
pub const HUB_MANIFEST: &[(&str, MethodKind)] = &[
    ("ping", MethodKind::Sync),
    ("metadata", MethodKind::Async),
    ("attendants", MethodKind::Source),
    ("createTunnel", MethodKind::Duplex),
    ("createToken", MethodKind::Async),
];

/// Client-side stand-in for the hub server API
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientHubApi;

impl ClientHubApi {
    pub fn new() -> Self {
        Self
    }

    pub fn attendants(&self) -> AttendantStream {
        stream::iter([Err(not_implemented())]).boxed()
    }

    pub fn connect(&self, _origin: &str) -> RefusedStream {
        RefusedStream::new(NOT_IMPLEMENTED_ON_CLIENT)
    }

    pub fn ping(&self) -> Result<u64, RpcError> {
        Err(not_implemented())
    }

    pub async fn create_token(&self) -> Result<String, RpcError> {
        Err(not_implemented())
    }

    pub async fn metadata(&self) -> Result<HubMetadata, RpcError> {
        Err(not_implemented())
    }
}

fn not_implemented() -> RpcError {
    RpcError::new(NOT_IMPLEMENTED_ON_CLIENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_every_call_fails() {
        let api = ClientHubApi::new();

        assert_eq!(api.ping().unwrap_err().message(), NOT_IMPLEMENTED_ON_CLIENT);
        assert!(api.create_token().await.is_err());
        assert!(api.metadata().await.is_err());

        let items: Vec<_> = api.attendants().collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());

        let mut duplex = api.connect("origin");
        let mut buf = [0u8; 1];
        assert!(duplex.read(&mut buf).await.is_err());
    }

    #[test]
    fn test_manifest_names() {
        let names: Vec<_> = HUB_MANIFEST.iter().map(|(name, _)| *name).collect();
        assert!(names.contains(&"createTunnel"));
        assert!(names.contains(&"attendants"));
    }
}
