//! Hub discovery module
//!
//! Observes hub attendance, keeps the table of observed hubs and broadcasts
//! newly discovered attendants.

mod notifier;
mod observer;
mod registry;

pub use notifier::*;
pub use observer::*;
pub use registry::*;
