use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations served. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "portalsim_requests_total";

/// Counter: injected 429/503 short-circuits. Labels: route, status.
pub const FAULTS_INJECTED_TOTAL: &str = "portalsim_faults_injected_total";

// ── Session metrics ─────────────────────────────────────────────

/// Counter: sessions minted.
pub const SESSIONS_CREATED_TOTAL: &str = "portalsim_sessions_created_total";

/// Counter: sessions evicted. Labels: cause (ttl | early).
pub const SESSIONS_EXPIRED_TOTAL: &str = "portalsim_sessions_expired_total";

/// Gauge: live sessions.
pub const SESSIONS_ACTIVE: &str = "portalsim_sessions_active";

// ── Churn metrics ───────────────────────────────────────────────

/// Counter: auto-mutation runs. Labels: kind, outcome (applied | noop).
pub const MUTATIONS_TOTAL: &str = "portalsim_mutations_total";

/// Histogram: slots flipped per applied mutation.
pub const MUTATION_SLOTS_CHANGED: &str = "portalsim_mutation_slots_changed";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
