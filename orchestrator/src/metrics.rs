//! Prometheus metrics for a workload run.
//!
//! [`RunMetrics`] owns a dedicated [`Registry`]; `votestorm run --metrics`
//! prints it in the Prometheus text exposition format when the run ends.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, HistogramOpts,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use votestorm_client::Operation;

/// Counters, gauges and histograms for one run.
pub struct RunMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Backend call attempts, by operation.
    pub calls: IntCounterVec,
    /// Failed backend call attempts, by operation.
    pub call_failures: IntCounterVec,
    /// Attempts repeated after a retryable failure.
    pub retries: IntCounter,
    pub accounts_funded: IntCounter,
    pub accounts_skipped: IntCounter,
    pub votes_cast: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Calls currently awaiting a response.
    pub calls_in_flight: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Backend call latency in milliseconds, by operation.
    pub call_latency_ms: HistogramVec,
}

impl RunMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let calls = register_int_counter_vec_with_registry!(
            Opts::new("votestorm_calls_total", "Backend call attempts"),
            &["operation"],
            registry
        )
        .expect("failed to register calls counter");

        let call_failures = register_int_counter_vec_with_registry!(
            Opts::new("votestorm_call_failures_total", "Failed backend call attempts"),
            &["operation"],
            registry
        )
        .expect("failed to register call_failures counter");

        let retries = register_int_counter_with_registry!(
            Opts::new("votestorm_retries_total", "Retried backend calls"),
            registry
        )
        .expect("failed to register retries counter");

        let accounts_funded = register_int_counter_with_registry!(
            Opts::new("votestorm_accounts_funded_total", "Accounts registered and minted"),
            registry
        )
        .expect("failed to register accounts_funded counter");

        let accounts_skipped = register_int_counter_with_registry!(
            Opts::new("votestorm_accounts_skipped_total", "Accounts dropped after a failure"),
            registry
        )
        .expect("failed to register accounts_skipped counter");

        let votes_cast = register_int_counter_with_registry!(
            Opts::new("votestorm_votes_cast_total", "Votes acknowledged by the backend"),
            registry
        )
        .expect("failed to register votes_cast counter");

        // Gauges
        let calls_in_flight = register_int_gauge_with_registry!(
            Opts::new("votestorm_calls_in_flight", "Backend calls awaiting a response"),
            registry
        )
        .expect("failed to register calls_in_flight gauge");

        // Histograms – exponential buckets covering 1 ms → ~32 s.
        let call_latency_ms = register_histogram_vec_with_registry!(
            HistogramOpts::new("votestorm_call_latency_ms", "Backend call latency in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 16).unwrap()),
            &["operation"],
            registry
        )
        .expect("failed to register call_latency_ms histogram");

        Self {
            registry,
            calls,
            call_failures,
            retries,
            accounts_funded,
            accounts_skipped,
            votes_cast,
            calls_in_flight,
            call_latency_ms,
        }
    }

    /// Record one finished call attempt.
    pub fn observe_call(&self, operation: Operation, elapsed: Duration, succeeded: bool) {
        let label = [operation.as_str()];
        self.calls.with_label_values(&label).inc();
        if !succeeded {
            self.call_failures.with_label_values(&label).inc();
        }
        self.call_latency_ms
            .with_label_values(&label)
            .observe(elapsed.as_secs_f64() * 1_000.0);
    }

    /// Raise `calls_in_flight` until the returned guard is dropped.
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.calls_in_flight.inc();
        InFlightGuard {
            gauge: self.calls_in_flight.clone(),
        }
    }

    pub fn calls_for(&self, operation: Operation) -> u64 {
        self.calls.with_label_values(&[operation.as_str()]).get()
    }

    pub fn failures_for(&self, operation: Operation) -> u64 {
        self.call_failures
            .with_label_values(&[operation.as_str()])
            .get()
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode_text(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Decrements `calls_in_flight` on drop, including when the call's task is
/// aborted mid-await.
pub struct InFlightGuard {
    gauge: IntGauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
