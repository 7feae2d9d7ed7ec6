use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the dispatcher and every session
#[derive(Debug, Default)]
pub struct LiveMetrics {
    jobs_pushed: AtomicU64,
    jobs_popped: AtomicU64,
    empty_pops: AtomicU64,
    push_failures: AtomicU64,
    protocol_errors: AtomicU64,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_jobs_pushed(&self) {
        self.jobs_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_jobs_popped(&self) {
        self.jobs_popped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_empty_pops(&self) {
        self.empty_pops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_push_failures(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_protocol_errors(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connections_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connections_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn jobs_pushed(&self) -> u64 {
        self.jobs_pushed.load(Ordering::Relaxed)
    }

    pub fn jobs_popped(&self) -> u64 {
        self.jobs_popped.load(Ordering::Relaxed)
    }

    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_pushed: self.jobs_pushed.load(Ordering::Relaxed),
            jobs_popped: self.jobs_popped.load(Ordering::Relaxed),
            empty_pops: self.empty_pops.load(Ordering::Relaxed),
            push_failures: self.push_failures.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_pushed: u64,
    pub jobs_popped: u64,
    pub empty_pops: u64,
    pub push_failures: u64,
    pub protocol_errors: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
}

impl MetricsSnapshot {
    /// Jobs accepted but not yet handed out
    pub fn jobs_in_flight(&self) -> u64 {
        self.jobs_pushed.saturating_sub(self.jobs_popped)
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }

    /// Share of pop requests that found the queue empty
    pub fn empty_pop_rate(&self) -> f64 {
        let total = self.jobs_popped + self.empty_pops;
        if total == 0 {
            0.0
        } else {
            (self.empty_pops as f64 / total as f64) * 100.0
        }
    }
}
