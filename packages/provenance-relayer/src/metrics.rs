//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Relay ---
    pub relays_submitted: AtomicU64,
    pub relays_confirmed: AtomicU64,
    pub relays_reverted: AtomicU64,
    pub sequence_mismatches: AtomicU64,

    // --- Custody ---
    pub custody_calls: AtomicU64,
    pub custody_batches: AtomicU64,

    // --- Confirmation wait (μs, max updated via CAS) ---
    pub confirm_wait_us_sum: AtomicU64,
    pub confirm_wait_us_max: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,
    pub rpc_retries: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            relays_submitted: AtomicU64::new(0),
            relays_confirmed: AtomicU64::new(0),
            relays_reverted: AtomicU64::new(0),
            sequence_mismatches: AtomicU64::new(0),
            custody_calls: AtomicU64::new(0),
            custody_batches: AtomicU64::new(0),
            confirm_wait_us_sum: AtomicU64::new(0),
            confirm_wait_us_max: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
            rpc_retries: AtomicU64::new(0),
        }
    }

    pub fn record_confirm_wait(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.confirm_wait_us_sum.fetch_add(us, Ordering::Relaxed);
        self.confirm_wait_us_max.fetch_max(us, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let submitted = self.relays_submitted.load(Ordering::Relaxed);
        let confirmed = self.relays_confirmed.load(Ordering::Relaxed);
        let reverted = self.relays_reverted.load(Ordering::Relaxed);
        let mismatches = self.sequence_mismatches.load(Ordering::Relaxed);
        let custody_calls = self.custody_calls.load(Ordering::Relaxed);
        let custody_batches = self.custody_batches.load(Ordering::Relaxed);
        let wait_sum = self.confirm_wait_us_sum.load(Ordering::Relaxed);
        let wait_max = self.confirm_wait_us_max.swap(0, Ordering::Relaxed);
        let rpc_failovers = self.rpc_failovers.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);
        let rpc_retries = self.rpc_retries.load(Ordering::Relaxed);

        // μs → seconds
        let wait_sum_s = wait_sum as f64 / 1_000_000.0;
        let wait_max_s = wait_max as f64 / 1_000_000.0;

        format!(
            "\
# HELP relayer_relays_submitted_total Relay requests submitted to the ledger.\n\
# TYPE relayer_relays_submitted_total counter\n\
relayer_relays_submitted_total {submitted}\n\
# HELP relayer_relays_confirmed_total Relay requests confirmed.\n\
# TYPE relayer_relays_confirmed_total counter\n\
relayer_relays_confirmed_total {confirmed}\n\
# HELP relayer_relays_reverted_total Relay requests reverted by the ledger.\n\
# TYPE relayer_relays_reverted_total counter\n\
relayer_relays_reverted_total {reverted}\n\
# HELP relayer_sequence_mismatches_total Reverts caused by a stale sequence number.\n\
# TYPE relayer_sequence_mismatches_total counter\n\
relayer_sequence_mismatches_total {mismatches}\n\
# HELP relayer_custody_calls_total Single calls proposed through the custody account.\n\
# TYPE relayer_custody_calls_total counter\n\
relayer_custody_calls_total {custody_calls}\n\
# HELP relayer_custody_batches_total Batches proposed through the custody account.\n\
# TYPE relayer_custody_batches_total counter\n\
relayer_custody_batches_total {custody_batches}\n\
# HELP relayer_confirm_wait_seconds_sum Total confirmation wait time (seconds).\n\
# TYPE relayer_confirm_wait_seconds_sum counter\n\
relayer_confirm_wait_seconds_sum {wait_sum_s:.6}\n\
# HELP relayer_confirm_wait_seconds_max Max confirmation wait since last scrape (seconds).\n\
# TYPE relayer_confirm_wait_seconds_max gauge\n\
relayer_confirm_wait_seconds_max {wait_max_s:.6}\n\
# HELP relayer_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE relayer_rpc_failovers_total counter\n\
relayer_rpc_failovers_total {rpc_failovers}\n\
# HELP relayer_rpc_errors_total RPC errors.\n\
# TYPE relayer_rpc_errors_total counter\n\
relayer_rpc_errors_total {rpc_errors}\n\
# HELP relayer_rpc_retries_total Read-only RPC retries.\n\
# TYPE relayer_rpc_retries_total counter\n\
relayer_rpc_retries_total {rpc_retries}\n"
        )
    }
}
