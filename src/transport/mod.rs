//! Tunnel transport
//!
//! Dials and accepts connections relayed through hubs.

mod capability;
mod tunnel;

pub use capability::*;
pub use tunnel::*;
