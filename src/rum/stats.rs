//! Engine counters

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Lifetime counters for one engine instance
#[derive(Debug, Default)]
pub struct RumStats {
    pub runs_started: AtomicU64,
    pub runs_completed: AtomicU64,
    pub runs_canceled: AtomicU64,
    pub runs_failed: AtomicU64,
    pub probes_succeeded: AtomicU64,
    pub probes_failed: AtomicU64,
    pub reports_succeeded: AtomicU64,
    pub reports_failed: AtomicU64,
    last_run_finished_at: RwLock<Option<DateTime<Utc>>>,
}

impl RumStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_run_finished(&self) {
        *self.last_run_finished_at.write() = Some(Utc::now());
    }

    pub fn snapshot(&self) -> RumStatsSnapshot {
        RumStatsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_canceled: self.runs_canceled.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            probes_succeeded: self.probes_succeeded.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            reports_succeeded: self.reports_succeeded.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            last_run_finished_at: *self.last_run_finished_at.read(),
        }
    }
}

/// Point-in-time copy of [`RumStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RumStatsSnapshot {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_canceled: u64,
    pub runs_failed: u64,
    pub probes_succeeded: u64,
    pub probes_failed: u64,
    pub reports_succeeded: u64,
    pub reports_failed: u64,
    pub last_run_finished_at: Option<DateTime<Utc>>,
}

impl RumStatsSnapshot {
    /// Runs that reached a terminal state
    pub fn runs_finished(&self) -> u64 {
        self.runs_completed + self.runs_canceled + self.runs_failed
    }
}
