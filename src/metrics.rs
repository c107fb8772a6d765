//! Prometheus metrics for the relayer
//!
//! Explicit registry owned by the `Metrics` struct; exposed through the
//! health server's `/metrics` route.

use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

pub struct Metrics {
    /// Transfers successfully relayed, labeled by direction
    pub events_relayed_total: IntCounterVec,
    /// Transfers skipped by the idempotency guard or skip cache
    pub events_skipped_total: IntCounterVec,
    /// Executions abandoned (simulation revert, non-retryable, exhausted)
    pub events_failed_total: IntCounterVec,
    /// Tick bodies that ended in an error
    pub tick_errors_total: IntCounterVec,
    /// Logs in a scanned window that did not decode (skipped, cursor advanced)
    pub undecodable_logs_total: IntCounter,
    /// Highest block scanned, labeled by chain
    pub last_scanned_block: IntGaugeVec,
    /// Endpoints still in the rotation, labeled by chain
    pub endpoints_alive: IntGaugeVec,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let events_relayed_total = IntCounterVec::new(
            Opts::new(
                "relayer_events_relayed_total",
                "Total transfers successfully relayed",
            ),
            &["direction"],
        )
        .expect("constant metric name is valid");

        let events_skipped_total = IntCounterVec::new(
            Opts::new(
                "relayer_events_skipped_total",
                "Total transfers skipped as already processed",
            ),
            &["direction"],
        )
        .expect("constant metric name is valid");

        let events_failed_total = IntCounterVec::new(
            Opts::new(
                "relayer_events_failed_total",
                "Total executions abandoned without success",
            ),
            &["direction"],
        )
        .expect("constant metric name is valid");

        let tick_errors_total = IntCounterVec::new(
            Opts::new("relayer_tick_errors_total", "Total failed ticks"),
            &["direction"],
        )
        .expect("constant metric name is valid");

        let undecodable_logs_total = IntCounter::new(
            "relayer_undecodable_logs_total",
            "Logs skipped because they failed to decode",
        )
        .expect("constant metric name is valid");

        let last_scanned_block = IntGaugeVec::new(
            Opts::new("relayer_last_scanned_block", "Highest block scanned"),
            &["chain"],
        )
        .expect("constant metric name is valid");

        let endpoints_alive = IntGaugeVec::new(
            Opts::new(
                "relayer_endpoints_alive",
                "RPC endpoints still in the rotation",
            ),
            &["chain"],
        )
        .expect("constant metric name is valid");

        // Registration is called exactly once at startup with unique
        // constant names
        registry
            .register(Box::new(events_relayed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(events_skipped_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(events_failed_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(tick_errors_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(undecodable_logs_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(last_scanned_block.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(endpoints_alive.clone()))
            .expect("metric registration must not be called twice");

        Self {
            events_relayed_total,
            events_skipped_total,
            events_failed_total,
            tick_errors_total,
            undecodable_logs_total,
            last_scanned_block,
            endpoints_alive,
            registry,
        }
    }
}
