//! Prometheus metrics for recurrence-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recurrence_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// Generation attempts by outcome (`success` or an error kind).
pub static GENERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recurrence_generations_total",
        "Total number of template generation attempts by outcome",
        &["outcome"]
    )
    .expect("Failed to register generations_total")
});

/// Generation duration histogram.
pub static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "recurrence_generation_duration_seconds",
        "Template generation duration in seconds",
        &["outcome"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register generation_duration")
});

/// Templates that reached their terminal state.
pub static TEMPLATES_TERMINATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recurrence_templates_terminated_total",
        "Total number of templates converted to one-shot",
        &["reason"] // limit_reached, past_end_date
    )
    .expect("Failed to register templates_terminated_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "recurrence_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "recurrence_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&GENERATIONS_TOTAL);
    Lazy::force(&GENERATION_DURATION);
    Lazy::force(&TEMPLATES_TERMINATED_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

pub fn record_http_request(method: &str, route: &str, status: &str) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, route, status])
        .inc();
}

pub fn record_generation(outcome: &str, duration_secs: f64) {
    GENERATIONS_TOTAL.with_label_values(&[outcome]).inc();
    GENERATION_DURATION
        .with_label_values(&[outcome])
        .observe(duration_secs);
}

pub fn record_template_terminated(reason: &str) {
    TEMPLATES_TERMINATED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
