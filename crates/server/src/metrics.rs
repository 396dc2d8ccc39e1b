use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "car_admin_operations_total",
        "Resource operations by resource, operation and outcome",
        &["resource", "op", "outcome"]
    )
    .expect("register operations_total")
});

pub static OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "car_admin_operation_duration_seconds",
        "Resource operation duration in seconds",
        &["resource", "op"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("register operation_duration")
});

pub static LOGINS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("car_admin_logins_total", "Login attempts by outcome", &["outcome"])
        .expect("register logins_total")
});

/// Count one finished operation. `outcome` is `ok` or the failure kind.
pub fn observe(resource: &str, op: &str, outcome: &str, secs: f64) {
    OPERATIONS_TOTAL.with_label_values(&[resource, op, outcome]).inc();
    OPERATION_DURATION.with_label_values(&[resource, op]).observe(secs);
}

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
