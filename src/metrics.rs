// Metrics and observability module
// This file handles collection of upstream latency, error counts and
// per-step execution outcomes
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

pub static REQ_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "stargate_request_latency_seconds",
        "latency for upstream calls",
        &["service", "method"]
    )
    .expect("register stargate_request_latency_seconds")
});

pub static REQ_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stargate_request_errors_total",
        "errors by upstream",
        &["service", "method"]
    )
    .expect("register stargate_request_errors_total")
});

pub static STEP_OUTCOMES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "stargate_step_outcomes_total",
        "route step outcomes by chain",
        &["chain", "outcome"]
    )
    .expect("register stargate_step_outcomes_total")
});
