use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Session lifecycle
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sessions_total",
        "Total number of assessment sessions",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sessions_active",
        "Number of sessions currently running"
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Total number of scoring passes by trigger and outcome",
        &["reason", "outcome"]
    )
    .unwrap();

    // Proctoring
    pub static ref VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "violations_total",
        "Total number of proctoring violations detected",
        &["kind"]
    )
    .unwrap();

    // Collaborators
    pub static ref PROMPTS_RELAYED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "prompts_relayed_total",
        "Total number of AI chat round-trips relayed",
        &["endpoint"]
    )
    .unwrap();

    pub static ref CODE_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "code_runs_total",
        "Total number of code-execution runs",
        &["status"]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active session event streams"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
