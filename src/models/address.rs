//! Tunnel addressing
//!
//! A tunnel is named `tunnel:<hub>:<target>`, where both parts are peer
//! identities. The same tunnel appears in the peer-info store under the
//! multiaddr `/tunnel/<hub>.<target>/shse/<target>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Scheme name shared by both address forms
pub const TUNNEL_SCHEME: &str = "tunnel";

/// Multiaddr protocol carrying the secret-handshake public key
const SHSE_PROTOCOL: &str = "shse";

/// Address parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),
    #[error("Unsupported scheme: {0}")]
    WrongScheme(String),
    #[error("Missing hub")]
    MissingHub,
    #[error("Missing target")]
    MissingTarget,
}

/// Address of a peer reachable through a hub.
///
/// Both identities are non-empty; every constructor, including
/// deserialization, goes through [`TunnelAddress::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TunnelAddressFields")]
pub struct TunnelAddress {
    hub: String,
    target: String,
}

/// Unchecked wire form of [`TunnelAddress`]
#[derive(Deserialize)]
struct TunnelAddressFields {
    hub: String,
    target: String,
}

impl TryFrom<TunnelAddressFields> for TunnelAddress {
    type Error = AddressError;

    fn try_from(fields: TunnelAddressFields) -> Result<Self, Self::Error> {
        TunnelAddress::new(fields.hub, fields.target)
    }
}

impl TunnelAddress {
    /// Create a tunnel address, rejecting empty identities
    pub fn new(hub: impl Into<String>, target: impl Into<String>) -> Result<Self, AddressError> {
        let hub = hub.into();
        let target = target.into();
        if hub.is_empty() {
            return Err(AddressError::MissingHub);
        }
        if target.is_empty() {
            return Err(AddressError::MissingTarget);
        }
        Ok(Self { hub, target })
    }

    /// Identity of the relaying hub
    pub fn hub(&self) -> &str {
        &self.hub
    }

    /// Identity of the peer on the other side of the hub
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Parse an address string, returning None on failure
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Multiaddr under which the peer-info store knows this tunnel
    pub fn to_multiaddr(&self) -> String {
        tunnel_multiaddr(&self.hub, &self.target)
    }
}

impl fmt::Display for TunnelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", TUNNEL_SCHEME, self.hub, self.target)
    }
}

impl FromStr for TunnelAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();

        if parts.len() != 3 {
            return Err(AddressError::InvalidFormat(s.to_string()));
        }
        if parts[0] != TUNNEL_SCHEME {
            return Err(AddressError::WrongScheme(parts[0].to_string()));
        }

        TunnelAddress::new(parts[1], parts[2])
    }
}

impl TryFrom<&str> for TunnelAddress {
    type Error = AddressError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// `/tunnel/<hub>.<target>/shse/<target>`
pub fn tunnel_multiaddr(hub: &str, target: &str) -> String {
    format!(
        "/{}/{}.{}/{}/{}",
        TUNNEL_SCHEME, hub, target, SHSE_PROTOCOL, target
    )
}

/// Whether a transport address names a relayed connection
pub fn is_tunnel_address(address: &str) -> bool {
    address
        .strip_prefix(TUNNEL_SCHEME)
        .map_or(false, |rest| rest.starts_with(':'))
}

/// Strip the single-use invite token from a hub multiaddr.
///
/// `/dns/hub.example/tcp/8008/shse/KEY.TOKEN` becomes
/// `/dns/hub.example/tcp/8008/shse/KEY`; addresses without a token are
/// returned unchanged.
pub fn normalize_hub_multiaddr(multiaddr: &str) -> String {
    let mut segments: Vec<&str> = multiaddr.split('/').collect();
    let mut i = 0;
    while i + 1 < segments.len() {
        if segments[i] == SHSE_PROTOCOL {
            if let Some((key, _token)) = segments[i + 1].split_once('.') {
                segments[i + 1] = key;
            }
            i += 1;
        }
        i += 1;
    }
    segments.join("/")
}
