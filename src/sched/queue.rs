//! Bounded FIFO ready queue of runnable threads.
//!
//! Grounded in the source kernel's `PriorityQueue` (`sched/queue.rs`): a
//! fixed-capacity ring that rejects enqueues past its bound rather than
//! growing unbounded. This core collapses the source's per-priority-level
//! array of rings into one `Vec`-backed queue, since the MLFQ policy here
//! tracks priority as a field on each entry and scans the whole queue for
//! it rather than indexing by priority level.

#![allow(dead_code)]

extern crate alloc;

use alloc::vec::Vec;

use crate::error::SchedError;

/// A single runnable thread's queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnableThread {
    pub tid: u32,
    pub priority: u8,
}

/// Bounded FIFO ring of runnable threads, in queue order (index 0 is next
/// to run under FIFO).
pub struct RunQueue {
    entries: Vec<RunnableThread>,
    capacity: usize,
}

impl RunQueue {
    pub fn init(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append a thread at the tail with the given starting priority.
    pub fn enqueue(&mut self, tid: u32, priority: u8) -> Result<(), SchedError> {
        if self.is_full() {
            return Err(SchedError::QueueFull);
        }
        self.entries.push(RunnableThread { tid, priority });
        Ok(())
    }

    /// Remove and return the entry at `index`, which becomes the head of
    /// the result of a rotate-to-head-then-dequeue step.
    pub fn remove_at(&mut self, index: usize) -> Option<RunnableThread> {
        if index >= self.entries.len() {
            return None;
        }
        Some(self.entries.remove(index))
    }

    pub fn entries(&self) -> &[RunnableThread] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [RunnableThread] {
        &mut self.entries
    }

    /// `scheduler_killall`: drop every entry, as done when the system is
    /// panicking and no further scheduling decisions matter.
    pub fn killall(&mut self) {
        self.entries.clear();
    }

    /// `scheduler_shutdown`: destroy the queue by shrinking it to nothing.
    pub fn shutdown(&mut self) {
        self.entries.clear();
        self.entries.shrink_to_fit();
    }
}
