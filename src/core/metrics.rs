use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    if PROM_HANDLE.set(handle).is_ok() {
        describe_scoring_metrics();
        tracing::info!("Prometheus recorder installed");
    }
    Ok(())
}

fn describe_scoring_metrics() {
    metrics::describe_counter!("scoring_jobs_total", "Finalized scoring runs by status");
    metrics::describe_counter!(
        "section_scoring_failures_total",
        "Sections degraded to a zero score during aggregation"
    );
    metrics::describe_histogram!(
        "scoring_duration_seconds",
        "End-to-end duration of one submission scoring run"
    );
    metrics::describe_counter!("http_requests_total", "HTTP responses by status code");
    metrics::describe_histogram!("http_request_duration_seconds", "HTTP response latency");
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
