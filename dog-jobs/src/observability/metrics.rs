use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Live counters for one worker pool
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    processed: AtomicU64,
    succeeded: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,

    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,

    job_types: Mutex<HashMap<String, JobTypeMetrics>>,
}

/// Counters for a single job type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobTypeMetrics {
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl JobTypeMetrics {
    /// Share of finished jobs that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.succeeded + self.failed + self.dropped;
        if finished == 0 {
            100.0
        } else {
            (self.succeeded as f64 / finished as f64) * 100.0
        }
    }
}

/// Point-in-time copy of [`WorkerMetrics`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
    pub dropped: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub job_types: HashMap<String, JobTypeMetrics>,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a handler invocation as in flight until the guard drops
    pub(crate) fn track(&self) -> InFlight<'_> {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        InFlight { metrics: self }
    }

    pub(crate) fn record_succeeded(&self, job_type: &str) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.job_types.lock().entry(job_type.to_string()).or_default().succeeded += 1;
    }

    pub(crate) fn record_retried(&self, job_type: &str) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        self.job_types.lock().entry(job_type.to_string()).or_default().retried += 1;
    }

    pub(crate) fn record_failed(&self, job_type: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.job_types.lock().entry(job_type.to_string()).or_default().failed += 1;
    }

    /// Terminal decode or routing error, no handler involved
    pub(crate) fn record_dropped(&self, job_type: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.job_types.lock().entry(job_type.to_string()).or_default().dropped += 1;
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Handler invocations currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest `in_flight` value observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn job_type(&self, job_type: &str) -> Option<JobTypeMetrics> {
        self.job_types.lock().get(job_type).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed(),
            succeeded: self.succeeded(),
            retried: self.retried(),
            failed: self.failed(),
            dropped: self.dropped(),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            job_types: self.job_types.lock().clone(),
        }
    }
}

pub(crate) struct InFlight<'a> {
    metrics: &'a WorkerMetrics,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
