//! Logging and metrics.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by method, status, node
//! - `lb_request_duration_seconds` (histogram): latency by node
//! - `lb_node_active` (gauge): 1=active, 0=inactive, per node
//!
//! Metric updates are cheap (atomic operations); the Prometheus exporter is
//! optional and gated by config.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured
/// default filter.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, node: &str, start: Instant) {
    metrics::counter!(
        "lb_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "node" => node.to_string()
    )
    .increment(1);
    metrics::histogram!("lb_request_duration_seconds", "node" => node.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_node_health(node: &str, active: bool) {
    metrics::gauge!("lb_node_active", "node" => node.to_string())
        .set(if active { 1.0 } else { 0.0 });
}
