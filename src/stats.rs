use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters, shared between the handle and the worker tasks.
#[derive(Debug, Default)]
pub struct LoggerStats {
    /// Entries accepted by `emit`.
    pub emitted_entries: AtomicU64,
    /// Entries refused because the pipeline had closed, or discarded
    /// unwritten when a transform error halted it.
    pub rejected_entries: AtomicU64,
    /// Non-empty batches sealed by the accumulator.
    pub batches_cut: AtomicU64,
    /// Batches appended to the sink.
    pub batches_written: AtomicU64,
    /// Batches dropped after a failed write, encode or transform.
    pub batches_failed: AtomicU64,
}

/// Point-in-time copy of [`LoggerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub emitted_entries: u64,
    pub rejected_entries: u64,
    pub batches_cut: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
}

impl LoggerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            emitted_entries: self.emitted_entries.load(Ordering::Relaxed),
            rejected_entries: self.rejected_entries.load(Ordering::Relaxed),
            batches_cut: self.batches_cut.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}
