//! Data models for the hub client
//!
//! Addresses, membership events and the records exchanged with the
//! peer-info store.

mod address;
mod attendant;
mod error;

pub use address::*;
pub use attendant::*;
pub use error::*;
