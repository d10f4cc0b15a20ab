//! Prometheus metrics for the vote ledger.
//!
//! [`LedgerMetrics`] owns a dedicated [`Registry`] so several services in one
//! process (tests, mostly) never collide on metric names.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::NodeError;

pub struct LedgerMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Blocks sealed, persisted and published.
    pub blocks_appended: IntCounter,
    /// Ballots committed.
    pub votes_cast: IntCounter,
    /// Vote submissions rejected as double casts.
    pub duplicate_votes: IntCounter,
    /// Appends abandoned after the timeout.
    pub append_timeouts: IntCounter,
    /// Appends that failed for any other reason.
    pub append_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub block_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one append (seal + persist), in milliseconds.
    pub append_time_ms: Histogram,
}

impl LedgerMetrics {
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let blocks_appended = register_int_counter_with_registry!(
            Opts::new("vox_blocks_appended_total", "Total blocks appended to the ledger"),
            registry
        )?;
        let votes_cast = register_int_counter_with_registry!(
            Opts::new("vox_votes_cast_total", "Total ballots committed"),
            registry
        )?;
        let duplicate_votes = register_int_counter_with_registry!(
            Opts::new(
                "vox_duplicate_votes_total",
                "Total vote submissions rejected as double casts"
            ),
            registry
        )?;
        let append_timeouts = register_int_counter_with_registry!(
            Opts::new("vox_append_timeouts_total", "Total appends that timed out"),
            registry
        )?;
        let append_failures = register_int_counter_with_registry!(
            Opts::new("vox_append_failures_total", "Total appends that failed"),
            registry
        )?;

        let block_count = register_int_gauge_with_registry!(
            Opts::new("vox_block_count", "Current number of blocks in the ledger"),
            registry
        )?;

        // 1 ms to ~16 s.
        let append_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("vox_append_time_ms", "Append latency in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_appended,
            votes_cast,
            duplicate_votes,
            append_timeouts,
            append_failures,
            block_count,
            append_time_ms,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| NodeError::Config(e.to_string()))
    }
}
