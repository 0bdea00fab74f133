//! Hub Client - client side of the hub relay protocol
//!
//! Lets a peer use hubs as rendezvous points:
//! - Presence observation: follow a hub's attendant roster and broadcast
//!   newly discovered attendants
//! - Tunnel transport: dial `tunnel:<hub>:<target>` addresses and accept
//!   streams a hub relays to us
//! - Hub registry: remember hubs and rank them by reliability

pub mod config;
pub mod models;
pub mod peer;
pub mod discovery;
pub mod transport;
pub mod client;
pub mod metrics;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use client::HubClient;
pub use config::{ClientSettings, Settings};
pub use discovery::{DiscoveryNotifier, DiscoveryStream, HubObserver, HubRegistry, HubSummary};
pub use models::{DiscoveryEvent, HubClientError, HubClientResult, TunnelAddress};
pub use peer::{ConnectHandler, HubRpc, InboundTunnel, Network, PeerSet, TunnelStream};
pub use transport::{TunnelServer, TunnelTransport};

/// Version of the hub-client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
