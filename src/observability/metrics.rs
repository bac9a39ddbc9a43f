//! Metrics collection and exposition.
//!
//! # Metrics
//! - `upload_proxy_requests_total` (counter): requests by method, status, outcome
//! - `upload_proxy_request_duration_seconds` (histogram): latency by method, outcome
//! - `upload_proxy_tls_rotations_total` (counter): client rotations by result
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exposition on its own listener, off the upload port

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "upload_proxy_requests_total";
pub const REQUEST_DURATION: &str = "upload_proxy_request_duration_seconds";
pub const TLS_ROTATIONS_TOTAL: &str = "upload_proxy_tls_rotations_total";

/// How a request ended, as seen by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Forwarded and answered by the backend, whatever its status.
    Forwarded,
    /// Refused before any backend was contacted.
    Rejected,
    /// Backend or state provider could not be reached.
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Forwarded => "forwarded",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished proxy request.
pub fn record_request(method: &str, status: u16, outcome: Outcome, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one backend client rotation attempt.
pub fn record_tls_rotation(ok: bool) {
    let result = if ok { "success" } else { "failure" };
    metrics::counter!(TLS_ROTATIONS_TOTAL, "result" => result).increment(1);
}
