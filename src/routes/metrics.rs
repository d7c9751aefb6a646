//! Prometheus metrics endpoint
//!
//! Exposes credential pool and cascade metrics in Prometheus format.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "keypool_selections_total",
        "Credentials handed to the cascade, by source (store or env)"
    );
    metrics::describe_counter!(
        "keypool_attempts_total",
        "Provider calls made by the cascade"
    );
    metrics::describe_counter!(
        "keypool_cascade_outcomes_total",
        "Cascade runs by final outcome"
    );
    metrics::describe_counter!(
        "keypool_cooldowns_total",
        "Credentials moved into cooldown"
    );
    metrics::describe_histogram!(
        "keypool_attempt_duration_seconds",
        "Provider call duration in seconds"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record where the cascade got its credential from
pub fn record_selection(provider: &str, source: &'static str) {
    metrics::counter!(
        "keypool_selections_total",
        "provider" => provider.to_string(),
        "source" => source
    )
    .increment(1);
}

/// Record one provider call
pub fn record_attempt(provider: &str, model: &str, result: &'static str, duration_secs: f64) {
    metrics::counter!(
        "keypool_attempts_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!(
        "keypool_attempt_duration_seconds",
        "provider" => provider.to_string(),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Record the final outcome of a cascade run
pub fn record_outcome(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "keypool_cascade_outcomes_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a credential entering cooldown
pub fn record_cooldown() {
    metrics::counter!("keypool_cooldowns_total").increment(1);
}
