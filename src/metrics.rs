//! Production observability metrics
//!
//! Recording goes through the `metrics` facade and costs nothing unless an
//! exporter is installed with [`init_metrics`], which binds a Prometheus
//! scrape endpoint.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

/// Metrics exporter errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be installed
    #[error("failed to install Prometheus exporter on {addr}: {message}")]
    InstallError {
        /// Listener address
        addr: SocketAddr,
        /// Underlying error text
        message: String,
    },
}

/// Install the Prometheus exporter and register metric descriptions.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::InstallError {
            addr,
            message: e.to_string(),
        })?;

    describe_counter!(
        "vep_requests_total",
        Unit::Count,
        "Total number of VEP HTTP requests, labelled by outcome"
    );
    describe_histogram!(
        "vep_request_duration_seconds",
        Unit::Seconds,
        "VEP request duration in seconds"
    );
    describe_counter!(
        "vep_retries_total",
        Unit::Count,
        "Total number of retry attempts"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_counter!(
        "batches_completed_total",
        Unit::Count,
        "Total number of batches annotated successfully"
    );
    describe_counter!(
        "batches_failed_total",
        Unit::Count,
        "Total number of batches that failed terminally"
    );
    describe_counter!(
        "variants_written_total",
        Unit::Count,
        "Total number of annotated variants written to the sink"
    );
    describe_gauge!(
        "workers_running",
        Unit::Count,
        "Batches currently being annotated"
    );

    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Record one completed HTTP exchange (or transport failure)
pub fn record_vep_request(outcome: &str, duration: Duration) {
    counter!("vep_requests_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("vep_request_duration_seconds").record(duration.as_secs_f64());
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("vep_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());

    debug!(
        attempt = attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record a batch reaching a terminal state
pub fn record_batch_outcome(succeeded: bool) {
    if succeeded {
        counter!("batches_completed_total").increment(1);
    } else {
        counter!("batches_failed_total").increment(1);
    }
}

/// Record variants handed to the sink
pub fn record_variants_written(count: usize) {
    counter!("variants_written_total").increment(count as u64);
}

/// Track running workers
pub fn set_workers_running(running: usize) {
    gauge!("workers_running").set(running as f64);
}
