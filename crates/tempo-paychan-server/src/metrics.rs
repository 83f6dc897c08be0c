use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "paychan_requests_total",
        "Total HTTP requests to payment-gated routes",
        &["endpoint", "status"]
    )
    .unwrap()
});

pub static ADMISSIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "paychan_admissions_total",
        "Admission check outcomes",
        &["result"]
    )
    .unwrap()
});

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Count one admission outcome and the HTTP status it produced.
pub fn record_admission(endpoint: &str, result: &str, status: u16) {
    ADMISSIONS.with_label_values(&[result]).inc();
    REQUESTS
        .with_label_values(&[endpoint, status.to_string().as_str()])
        .inc();
}
