//! Prometheus metrics HTTP server.
//!
//! Exposes ingest statistics in Prometheus text format via HTTP endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::stats::IngestStats;

/// Start the Prometheus metrics HTTP server.
///
/// Runs in the background and serves metrics at `/metrics`.
/// Returns an error if the server fails to bind to the port.
pub async fn start_metrics_server(
    port: u16,
    stats: Arc<IngestStats>,
) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(stats);

    let listener = TcpListener::bind(addr).await?;
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(stats): State<Arc<IngestStats>>) -> impl IntoResponse {
    let output = format_prometheus_metrics(&stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

/// Format statistics as Prometheus text format.
fn format_prometheus_metrics(stats: &IngestStats) -> String {
    let summary = stats.summary();
    let mut output = String::with_capacity(4096);

    // Uptime
    output.push_str("# HELP telemetry_uptime_seconds Time since the server started\n");
    output.push_str("# TYPE telemetry_uptime_seconds gauge\n");
    output.push_str(&format!(
        "telemetry_uptime_seconds {:.3}\n",
        summary.elapsed_secs
    ));

    // Samples
    output.push_str("# HELP telemetry_samples_total Total number of samples decoded\n");
    output.push_str("# TYPE telemetry_samples_total counter\n");
    output.push_str(&format!(
        "telemetry_samples_total {}\n",
        summary.total_samples
    ));

    // Blank lines
    output.push_str("# HELP telemetry_blank_lines_total Blank lines skipped before decoding\n");
    output.push_str("# TYPE telemetry_blank_lines_total counter\n");
    output.push_str(&format!(
        "telemetry_blank_lines_total {}\n",
        summary.blank_lines
    ));

    // Bytes processed
    output.push_str("# HELP telemetry_bytes_processed_total Total bytes of raw input read\n");
    output.push_str("# TYPE telemetry_bytes_processed_total counter\n");
    output.push_str(&format!(
        "telemetry_bytes_processed_total {}\n",
        summary.bytes_processed
    ));

    // Connections
    output.push_str("# HELP telemetry_connections_total Connections by lifecycle state\n");
    output.push_str("# TYPE telemetry_connections_total counter\n");
    output.push_str(&format!(
        "telemetry_connections_total{{state=\"opened\"}} {}\n",
        summary.connections_opened
    ));
    output.push_str(&format!(
        "telemetry_connections_total{{state=\"closed\"}} {}\n",
        summary.connections_closed
    ));

    // Active connections
    output.push_str("# HELP telemetry_active_connections Connections currently being handled\n");
    output.push_str("# TYPE telemetry_active_connections gauge\n");
    output.push_str(&format!(
        "telemetry_active_connections {}\n",
        summary.active_connections
    ));

    // Read errors
    output.push_str("# HELP telemetry_read_errors_total Connections terminated by a read error\n");
    output.push_str("# TYPE telemetry_read_errors_total counter\n");
    output.push_str(&format!(
        "telemetry_read_errors_total {}\n",
        summary.read_errors
    ));

    // Samples per second rate
    output.push_str("# HELP telemetry_samples_per_second Current sample decode rate\n");
    output.push_str("# TYPE telemetry_samples_per_second gauge\n");
    output.push_str(&format!(
        "telemetry_samples_per_second {:.3}\n",
        summary.samples_per_second
    ));

    // Undefined fields by wire key
    output.push_str(
        "# HELP telemetry_undefined_fields_total Samples with the field absent or unparseable\n",
    );
    output.push_str("# TYPE telemetry_undefined_fields_total counter\n");
    for (field, count) in &summary.undefined_fields {
        output.push_str(&format!(
            "telemetry_undefined_fields_total{{field=\"{}\"}} {}\n",
            field, count
        ));
    }

    // Speed distribution
    if let Some(ref speed) = summary.speed_percentiles {
        output.push_str("# HELP telemetry_speed_mps Speed distribution in meters per second\n");
        output.push_str("# TYPE telemetry_speed_mps summary\n");
        output.push_str(&format!(
            "telemetry_speed_mps{{quantile=\"0.5\"}} {:.2}\n",
            speed.p50
        ));
        output.push_str(&format!(
            "telemetry_speed_mps{{quantile=\"0.9\"}} {:.2}\n",
            speed.p90
        ));
        output.push_str(&format!(
            "telemetry_speed_mps{{quantile=\"0.99\"}} {:.2}\n",
            speed.p99
        ));
        output.push_str(&format!("telemetry_speed_mps_count {}\n", speed.count));
    }

    output
}
