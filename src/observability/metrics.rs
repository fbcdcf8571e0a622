//! Synchronization counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Thread-safe via relaxed atomics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by all synchronizations of one engine.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    applied: AtomicU64,
    skipped: AtomicU64,
    /// Rejected before any mutation (invalid design)
    rejected: AtomicU64,
    rolled_back: AtomicU64,
    partial_applies: AtomicU64,
    tables_created: AtomicU64,
    columns_added: AtomicU64,
    columns_resized: AtomicU64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rolled_back(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_partial_applies(&self) {
        self.partial_applies.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the schema operations of one committed plan.
    pub fn add_changes(&self, tables_created: u64, columns_added: u64, columns_resized: u64) {
        self.tables_created.fetch_add(tables_created, Ordering::Relaxed);
        self.columns_added.fetch_add(columns_added, Ordering::Relaxed);
        self.columns_resized.fetch_add(columns_resized, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            partial_applies: self.partial_applies.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            columns_added: self.columns_added.load(Ordering::Relaxed),
            columns_resized: self.columns_resized.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`SyncMetrics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncMetricsSnapshot {
    pub applied: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub rolled_back: u64,
    pub partial_applies: u64,
    pub tables_created: u64,
    pub columns_added: u64,
    pub columns_resized: u64,
}
