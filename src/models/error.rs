//! Error types for the hub client

use std::fmt;

use thiserror::Error;

/// Suffix the RPC layer puts on errors for methods a peer does not expose
const MISSING_METHOD_SUFFIX: &str = "not in list of allowed methods";

/// Messages signalling that the remote end closed the stream on purpose
const TERMINATION_SIGNATURES: &[&str] = &[
    "unexpected end of parent stream",
    "parent stream is closing",
    "stream ended with error: end",
];

/// Messages produced by ordinary socket-level failures
const NETWORK_SIGNATURES: &[&str] = &[
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "EPIPE",
    "EHOSTUNREACH",
    "ENETUNREACH",
    "ENOTFOUND",
    "ENOTCONN",
    "socket hang up",
    "timed out",
    "connection reset",
    "broken pipe",
];

/// Hub client errors
#[derive(Debug, Error)]
pub enum HubClientError {
    #[error("invalid tunnel address {0}")]
    InvalidAddress(String),

    #[error("cant connect to {address} because hub {hub} is offline or unknown")]
    HubUnreachable { hub: String, address: String },

    #[error("error getting updates from hub {hub} ({severity}): {message}")]
    StreamTerminated {
        hub: String,
        severity: StreamSeverity,
        message: String,
    },

    #[error("Could not connect to {origin} via {hub}")]
    BridgeRefused { origin: String, hub: String },

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Peer set error: {0}")]
    PeerSet(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubClientError {
    pub fn hub_unreachable(hub: impl Into<String>, address: impl Into<String>) -> Self {
        HubClientError::HubUnreachable {
            hub: hub.into(),
            address: address.into(),
        }
    }

    pub fn bridge_refused(origin: impl Into<String>, hub: impl Into<String>) -> Self {
        HubClientError::BridgeRefused {
            origin: origin.into(),
            hub: hub.into(),
        }
    }

    /// Whether a dial failed only because the hub link is missing, which
    /// callers may retry later
    pub fn is_unreachable(&self) -> bool {
        matches!(self, HubClientError::HubUnreachable { .. })
    }
}

impl From<std::io::Error> for HubClientError {
    fn from(err: std::io::Error) -> Self {
        HubClientError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for HubClientError {
    fn from(err: config::ConfigError) -> Self {
        HubClientError::ConfigError(err.to_string())
    }
}

/// Result type for hub client operations
pub type HubClientResult<T> = Result<T, HubClientError>;

/// Error reported by the RPC layer for a call to a remote peer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RpcError {
    message: String,
}

impl RpcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error a peer returns when asked for a method it does not expose
    pub fn method_not_allowed(method: &str) -> Self {
        Self::new(format!("method:{} is {}", method, MISSING_METHOD_SUFFIX))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when the remote peer lacks the called method altogether
    pub fn is_missing_method(&self) -> bool {
        self.message.ends_with(MISSING_METHOD_SUFFIX)
    }

    pub fn severity(&self) -> StreamSeverity {
        StreamSeverity::classify(&self.message)
    }
}

/// How bad a failed long-lived stream is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamSeverity {
    /// The remote end signalled termination; equivalent to a close
    Terminated,
    /// Ordinary network trouble; reconnecting is the transport's job
    Network,
    /// Anything we do not recognise
    Unexpected,
}

impl StreamSeverity {
    /// Classify an error message by its transport-level signature
    pub fn classify(message: &str) -> Self {
        if TERMINATION_SIGNATURES.iter().any(|s| message.contains(s)) {
            StreamSeverity::Terminated
        } else if NETWORK_SIGNATURES
            .iter()
            .any(|s| message.to_ascii_lowercase().contains(&s.to_ascii_lowercase()))
        {
            StreamSeverity::Network
        } else {
            StreamSeverity::Unexpected
        }
    }

    /// Whether the owning observer must be torn down
    pub fn is_fatal(&self) -> bool {
        *self == StreamSeverity::Terminated
    }
}

impl fmt::Display for StreamSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSeverity::Terminated => write!(f, "terminated"),
            StreamSeverity::Network => write!(f, "network"),
            StreamSeverity::Unexpected => write!(f, "unexpected"),
        }
    }
}
