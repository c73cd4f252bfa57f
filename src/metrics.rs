use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;

use crate::kind::MetricKind;

lazy_static! {
    // Store metrics
    pub static ref STORE_QUERIES: IntCounterVec = register_int_counter_vec!(
        "measure_store_queries_total",
        "Total number of queries sent to the metrics store",
        &["kind"]
    ).expect("register measure_store_queries_total");

    pub static ref STORE_QUERY_FAILURES: IntCounterVec = register_int_counter_vec!(
        "measure_store_query_failures_total",
        "Total number of metric queries that ended in an error",
        &["kind"]
    ).expect("register measure_store_query_failures_total");

    pub static ref STORE_QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "measure_store_query_duration_seconds",
        "Time spent querying and reducing one metric kind",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
    ).expect("register measure_store_query_duration_seconds");

    // Descriptor metrics
    pub static ref DESCRIPTOR_LOOKUPS: IntCounter = register_int_counter!(
        "measure_descriptor_lookups_total",
        "Total number of descriptor lookups"
    ).expect("register measure_descriptor_lookups_total");

    pub static ref METRICS_NOT_CONFIGURED: IntCounter = register_int_counter!(
        "measure_metrics_not_configured_total",
        "Requests for apps without a metrics backend"
    ).expect("register measure_metrics_not_configured_total");
}

/// Times one metric kind's query; records on drop.
pub struct QueryTimer {
    kind: MetricKind,
    start: Instant,
}

impl QueryTimer {
    pub fn new(kind: MetricKind) -> Self {
        STORE_QUERIES.with_label_values(&[kind.as_str()]).inc();
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        STORE_QUERY_DURATION
            .with_label_values(&[self.kind.as_str()])
            .observe(duration);
    }
}

pub fn record_failure(kind: MetricKind) {
    STORE_QUERY_FAILURES.with_label_values(&[kind.as_str()]).inc();
}

pub fn record_not_configured() {
    METRICS_NOT_CONFIGURED.inc();
}

/// Text exposition of everything registered in the default registry.
pub fn render() -> String {
    let mut buffer = Vec::new();
    let families = prometheus::gather();
    if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_counts_queries() {
        let before = STORE_QUERIES.with_label_values(&["swap"]).get();
        drop(QueryTimer::new(MetricKind::Swap));
        assert_eq!(STORE_QUERIES.with_label_values(&["swap"]).get(), before + 1);
        assert!(render().contains("measure_store_queries_total"));
    }
}
