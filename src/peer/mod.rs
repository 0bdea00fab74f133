//! Interfaces to the rest of the peer
//!
//! The RPC layer, connection manager and stores are provided by the
//! embedding application through these traits.

mod network;
mod rpc;
mod stream;
mod stub;

pub use network::*;
pub use rpc::*;
pub use stream::*;
pub use stub::*;
