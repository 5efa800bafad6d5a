//! Prometheus metrics, rendered at `GET /metrics` on the HTTP surface.

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and return a handle for rendering.
/// Idempotent; the first call wins and later calls get the same handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            describe_counter!(
                "lockbox_requests_total",
                "Total number of requests processed, by surface and operation"
            );
            describe_histogram!(
                "lockbox_request_duration_seconds",
                "Request duration in seconds, by surface and operation"
            );
            describe_counter!(
                "lockbox_errors_total",
                "Total number of failed requests, by surface, operation and error tag"
            );

            handle
        })
        .clone()
}

pub fn record_request(surface: &'static str, operation: &'static str, started: Instant) {
    counter!("lockbox_requests_total", "surface" => surface, "operation" => operation)
        .increment(1);
    histogram!("lockbox_request_duration_seconds", "surface" => surface, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_error(surface: &'static str, operation: &'static str, tag: &'static str) {
    counter!("lockbox_errors_total", "surface" => surface, "operation" => operation, "error" => tag)
        .increment(1);
}
