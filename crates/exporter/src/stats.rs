//! Exporter statistics
//!
//! Lock-free counters updated from the ingress path and the workers, with a
//! point-in-time snapshot for callers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counter set shared across ingress, batcher, and dispatchers
#[derive(Debug, Default)]
pub(crate) struct ExporterMetrics {
    records_accepted: AtomicU64,
    records_dropped: AtomicU64,
    records_force_flushed: AtomicU64,
    batches_dispatched: AtomicU64,
    entries_dispatched: AtomicU64,
    requests_delivered: AtomicU64,
    publish_failures: AtomicU64,
    publish_retries: AtomicU64,
}

impl ExporterMetrics {
    pub(crate) fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_force_flushed(&self) {
        self.records_force_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_dispatched(&self, entries: u64, requests: u64) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.entries_dispatched.fetch_add(entries, Ordering::Relaxed);
        self.requests_delivered.fetch_add(requests, Ordering::Relaxed);
    }

    pub(crate) fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish_retry(&self) {
        self.publish_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ExporterStats {
        ExporterStats {
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            records_force_flushed: self.records_force_flushed.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            entries_dispatched: self.entries_dispatched.load(Ordering::Relaxed),
            requests_delivered: self.requests_delivered.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            publish_retries: self.publish_retries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time exporter statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExporterStats {
    /// Best-effort records admitted to the queue
    pub records_accepted: u64,
    /// Best-effort records dropped at the queue boundary
    pub records_dropped: u64,
    /// Records delivered through the force-flush path
    pub records_force_flushed: u64,
    /// Batches handed to the collector successfully
    pub batches_dispatched: u64,
    /// Aggregated entries across all dispatched batches
    pub entries_dispatched: u64,
    /// Sum of request counts across all dispatched entries
    pub requests_delivered: u64,
    /// Publishes abandoned after retries were exhausted
    pub publish_failures: u64,
    /// Individual retry attempts across all publishes
    pub publish_retries: u64,
}
