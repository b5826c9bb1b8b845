//! Runtime counters for the future-resolution machinery.
//!
//! One atomic-counter struct shared across the pool, dispatcher and monitor;
//! `snapshot()` takes a consistent-enough point-in-time copy for logs,
//! health endpoints and tests. Counters only ever increase.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters recorded by the runtime. Cheap to update from any thread.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    futures_created: AtomicU64,
    futures_resolved: AtomicU64,
    replies_delivered: AtomicU64,
    orphan_replies: AtomicU64,
    duplicate_replies: AtomicU64,
    early_results_consumed: AtomicU64,
    wait_timeouts: AtomicU64,
    continuations_enqueued: AtomicU64,
    continuation_sends: AtomicU64,
    continuation_send_failures: AtomicU64,
    probes: AtomicU64,
    probe_failures: AtomicU64,
    forced_resolutions: AtomicU64,
}

impl RuntimeMetrics {
    pub(crate) fn record_future_created(&self) {
        self.futures_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_future_resolved(&self) {
        self.futures_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reply_delivered(&self) {
        self.replies_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_orphan_reply(&self) {
        self.orphan_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate_reply(&self) {
        self.duplicate_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_early_result_consumed(&self) {
        self.early_results_consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait_timeout(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_continuations_enqueued(&self, targets: usize) {
        self.continuations_enqueued
            .fetch_add(targets as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_continuation_sent(&self) {
        self.continuation_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_continuation_send_failure(&self) {
        self.continuation_send_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_probe_failure(&self) {
        self.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forced_resolution(&self) {
        self.forced_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            futures_created: self.futures_created.load(Ordering::Relaxed),
            futures_resolved: self.futures_resolved.load(Ordering::Relaxed),
            replies_delivered: self.replies_delivered.load(Ordering::Relaxed),
            orphan_replies: self.orphan_replies.load(Ordering::Relaxed),
            duplicate_replies: self.duplicate_replies.load(Ordering::Relaxed),
            early_results_consumed: self.early_results_consumed.load(Ordering::Relaxed),
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
            continuations_enqueued: self.continuations_enqueued.load(Ordering::Relaxed),
            continuation_sends: self.continuation_sends.load(Ordering::Relaxed),
            continuation_send_failures: self.continuation_send_failures.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            forced_resolutions: self.forced_resolutions.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub futures_created: u64,
    pub futures_resolved: u64,
    pub replies_delivered: u64,
    pub orphan_replies: u64,
    pub duplicate_replies: u64,
    pub early_results_consumed: u64,
    pub wait_timeouts: u64,
    pub continuations_enqueued: u64,
    pub continuation_sends: u64,
    pub continuation_send_failures: u64,
    pub probes: u64,
    pub probe_failures: u64,
    pub forced_resolutions: u64,
}
