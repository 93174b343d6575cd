use std::time::Duration;

use tokio::time::Instant;

use crate::entry::Entry;

/// Upper bound on the buffer space reserved ahead of time per window.
const MAX_PREALLOC: usize = 1024;

/// Observable state of the open batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    /// Nothing buffered since the last cut.
    Idle,
    /// At least one entry buffered.
    Filling,
}

/// Dual-threshold batch builder.
///
/// Owns the buffer and the deadline of the current window together, so a
/// single owner (the pipeline task) decides every append and every cut.
/// The window always restarts at the last cut, never on a fixed grid.
#[derive(Debug)]
pub struct Accumulator {
    buffer: Vec<Entry>,
    entry_limit: usize,
    window: Duration,
    deadline: Instant,
}

impl Accumulator {
    pub fn new(entry_limit: usize, window: Duration, now: Instant) -> Self {
        let entry_limit = entry_limit.max(1);
        Accumulator {
            buffer: Vec::with_capacity(entry_limit.min(MAX_PREALLOC)),
            entry_limit,
            window,
            deadline: now + window,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        if self.buffer.is_empty() {
            AccumulatorState::Idle
        } else {
            AccumulatorState::Filling
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// When the current window closes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Buffer one entry. Returns the sealed batch when this entry filled it.
    pub fn intake(&mut self, entry: Entry, now: Instant) -> Option<Vec<Entry>> {
        self.buffer.push(entry);
        if self.buffer.len() >= self.entry_limit {
            Some(self.cut(now))
        } else {
            None
        }
    }

    /// Timer expiry. Always rearms the window; an empty window yields nothing.
    pub fn on_timer(&mut self, now: Instant) -> Option<Vec<Entry>> {
        let batch = self.cut(now);
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    /// Seal whatever is buffered (possibly nothing) and start a new window.
    pub fn cut(&mut self, now: Instant) -> Vec<Entry> {
        self.deadline = now + self.window;
        let capacity = self.entry_limit.min(MAX_PREALLOC);
        std::mem::replace(&mut self.buffer, Vec::with_capacity(capacity))
    }
}
