//! Metrics module
//!
//! Prometheus counters for hub observation, dialing and bridging.

mod prometheus;

pub use self::prometheus::*;
