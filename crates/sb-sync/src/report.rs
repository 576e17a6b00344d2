//! Run counters and the report handed back to callers.

use std::sync::atomic::{AtomicU64, Ordering};

use sb_core::{SyncMode, SyncRunId};
use serde::Serialize;

/// A monotonically increasing counter shared between stage tasks.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live counters of one run, shared by every stage through an `Arc`.
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Files emitted by the walker.
    pub seen: Counter,
    /// Files with no prior record.
    pub new: Counter,
    /// Files marked for reprocessing (any reason).
    pub dirty: Counter,
    /// Files that took the fast path.
    pub unchanged: Counter,
    /// Files rejected by a path filter.
    pub filtered: Counter,
    pub extract_failed: Counter,
    pub write_failed: Counter,
    /// Dirty files written in full.
    pub persisted: Counter,
    /// Clean files only stamped as seen.
    pub touched: Counter,
    /// Records removed by cleanup.
    pub deleted: Counter,
}

impl SyncStats {
    pub fn report(&self, run_id: SyncRunId, mode: SyncMode, force: bool) -> SyncReport {
        SyncReport {
            run_id,
            mode,
            force,
            seen: self.seen.get(),
            new: self.new.get(),
            dirty: self.dirty.get(),
            unchanged: self.unchanged.get(),
            filtered: self.filtered.get(),
            extract_failed: self.extract_failed.get(),
            write_failed: self.write_failed.get(),
            persisted: self.persisted.get(),
            touched: self.touched.get(),
            deleted: self.deleted.get(),
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: SyncRunId,
    pub mode: SyncMode,
    pub force: bool,
    pub seen: u64,
    pub new: u64,
    pub dirty: u64,
    pub unchanged: u64,
    pub filtered: u64,
    pub extract_failed: u64,
    pub write_failed: u64,
    pub persisted: u64,
    pub touched: u64,
    pub deleted: u64,
}
