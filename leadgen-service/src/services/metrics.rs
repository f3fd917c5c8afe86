//! Metrics collection for leadgen-service.
//!
//! Counters go through the `metrics` facade; the Prometheus recorder installed
//! here renders them for `GET /metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALL: Once = Once::new();

/// Install the Prometheus recorder. Later calls are no-ops and block until
/// the first install has finished.
pub fn init_metrics() {
    INSTALL.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if METRICS_HANDLE.set(handle).is_err() {
                tracing::warn!("Metrics handle already initialized");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install Prometheus recorder"),
    });
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// `source` is `cache` or the provider name.
pub fn record_description(source: &'static str) {
    metrics::counter!("leadgen_descriptions_total", "source" => source).increment(1);
}

pub fn record_description_error(kind: &'static str) {
    metrics::counter!("leadgen_description_errors_total", "kind" => kind).increment(1);
}

pub fn record_email(step: &str, outcome: &'static str) {
    metrics::counter!(
        "leadgen_emails_total",
        "step" => step.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_lead_upsert(status: &'static str) {
    metrics::counter!("leadgen_lead_upserts_total", "status" => status).increment(1);
}

pub fn record_unsubscribe(status: &'static str) {
    metrics::counter!("leadgen_unsubscribes_total", "status" => status).increment(1);
}
