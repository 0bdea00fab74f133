//! Prometheus metrics for hub links and tunnels

use once_cell::sync::Lazy;
use prometheus::{opts, register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder};

static HUBS_OBSERVED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        opts!("hub_client_hubs_observed", "Number of hubs currently under observation")
    )
    .expect("Failed to create hubs observed gauge")
});

static ATTENDANTS_DISCOVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        opts!("hub_client_attendants_discovered_total", "Total number of discovery events emitted")
    )
    .expect("Failed to create attendants discovered counter")
});

static TUNNELS_DIALED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        opts!("hub_client_tunnels_dialed_total", "Total number of tunnels opened through a hub")
    )
    .expect("Failed to create tunnels dialed counter")
});

static TUNNEL_DIAL_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        opts!("hub_client_tunnel_dial_failures_total", "Total number of failed tunnel dials")
    )
    .expect("Failed to create tunnel dial failures counter")
});

static BRIDGED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        opts!("hub_client_bridged_total", "Total number of inbound tunnel requests bridged")
    )
    .expect("Failed to create bridged counter")
});

static BRIDGE_REFUSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        opts!("hub_client_bridge_refused_total", "Total number of inbound tunnel requests refused")
    )
    .expect("Failed to create bridge refused counter")
});

/// Initialize all metrics
pub fn init_metrics() {
    // Force lazy initialization
    Lazy::force(&HUBS_OBSERVED);
    Lazy::force(&ATTENDANTS_DISCOVERED_TOTAL);
    Lazy::force(&TUNNELS_DIALED_TOTAL);
    Lazy::force(&TUNNEL_DIAL_FAILURES_TOTAL);
    Lazy::force(&BRIDGED_TOTAL);
    Lazy::force(&BRIDGE_REFUSED_TOTAL);
}

/// Set number of observed hubs
pub fn set_hubs_observed(count: usize) {
    HUBS_OBSERVED.set(count as i64);
}

/// Record a discovery event
pub fn record_attendant_discovered() {
    ATTENDANTS_DISCOVERED_TOTAL.inc();
}

/// Record a tunnel opened by dialing
pub fn record_tunnel_dialed() {
    TUNNELS_DIALED_TOTAL.inc();
}

/// Record a failed dial
pub fn record_tunnel_dial_failure() {
    TUNNEL_DIAL_FAILURES_TOTAL.inc();
}

/// Record an inbound tunnel handed to the accept pipeline
pub fn record_bridged() {
    BRIDGED_TOTAL.inc();
}

/// Record a refused inbound tunnel request
pub fn record_bridge_refused() {
    BRIDGE_REFUSED_TOTAL.inc();
}

/// Render every registered metric in the Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
