//! The three run-queue selection policies: FIFO, RANDOM, and a multi-level
//! feedback queue with periodic anti-starvation aging.
//!
//! Grounded in the source kernel's `Scheduler::pick_next` dispatch
//! (`sched/scheduler.rs`), trimmed to the three policies this core's data
//! model calls for and built as free functions over [`RunQueue`] rather
//! than methods on a scheduler object, matching the free-function shape
//! already used for the paging engine.

#![allow(dead_code)]

extern crate alloc;

use crate::config::{MLFQ_RESET_PERIOD, MLFQ_RESET_PRIORITY};
use crate::error::SchedError;
use crate::rng::Xorshift64;
use crate::sched::queue::RunQueue;

/// Which of the three run-queue selection policies is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    Fifo,
    Random,
    Mlfq,
}

/// MLFQ's aging state: a running count of scheduler invocations, reset
/// every [`MLFQ_RESET_PERIOD`] calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MlfqState {
    cycles: u64,
}

impl MlfqState {
    pub const fn new() -> Self {
        Self { cycles: 0 }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// `scheduler_pick_next`: select and dequeue the next thread to run under
/// `policy`, given queue `q`. Must be called with interrupts disabled by
/// the caller (this function itself does no interrupt bookkeeping, per the
/// narrow-collaborator boundary the VM world's callers use).
pub fn pick_next(
    q: &mut RunQueue,
    policy: SchedPolicy,
    mlfq: &mut MlfqState,
    rng: &mut Xorshift64,
) -> Result<u32, SchedError> {
    if q.is_empty() {
        return Err(SchedError::QueueEmpty);
    }

    match policy {
        SchedPolicy::Fifo => Ok(q.remove_at(0).unwrap().tid),
        SchedPolicy::Random => {
            let idx = rng.next_below(q.len());
            Ok(q.remove_at(idx).unwrap().tid)
        }
        SchedPolicy::Mlfq => Ok(pick_mlfq(q, mlfq, rng)),
    }
}

fn pick_mlfq(q: &mut RunQueue, mlfq: &mut MlfqState, rng: &mut Xorshift64) -> u32 {
    mlfq.cycles += 1;

    if mlfq.cycles.is_multiple_of(MLFQ_RESET_PERIOD) {
        for entry in q.entries_mut() {
            entry.priority = MLFQ_RESET_PRIORITY;
        }
        return q.remove_at(0).unwrap().tid;
    }

    let mut chosen = 0usize;
    let mut best_priority = q.entries()[0].priority;
    for (i, entry) in q.entries().iter().enumerate().skip(1) {
        if entry.priority > best_priority {
            best_priority = entry.priority;
            chosen = i;
        } else if entry.priority == best_priority && rng.one_in(3) {
            chosen = i;
        }
    }

    q.remove_at(chosen).unwrap().tid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_dequeues_in_arrival_order() {
        let mut q = RunQueue::init(4);
        q.enqueue(1, 50).unwrap();
        q.enqueue(2, 50).unwrap();
        let mut mlfq = MlfqState::new();
        let mut rng = Xorshift64::new(1);
        assert_eq!(pick_next(&mut q, SchedPolicy::Fifo, &mut mlfq, &mut rng).unwrap(), 1);
        assert_eq!(pick_next(&mut q, SchedPolicy::Fifo, &mut mlfq, &mut rng).unwrap(), 2);
        assert!(matches!(pick_next(&mut q, SchedPolicy::Fifo, &mut mlfq, &mut rng), Err(SchedError::QueueEmpty)));
    }

    #[test]
    fn random_always_returns_a_queued_thread() {
        let mut q = RunQueue::init(8);
        for tid in 1..=5 {
            q.enqueue(tid, 50).unwrap();
        }
        let mut mlfq = MlfqState::new();
        let mut rng = Xorshift64::new(99);
        let mut seen = alloc::vec::Vec::new();
        while let Ok(tid) = pick_next(&mut q, SchedPolicy::Random, &mut mlfq, &mut rng) {
            seen.push(tid);
        }
        seen.sort_unstable();
        assert_eq!(seen, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn mlfq_prefers_the_highest_priority_entry() {
        let mut q = RunQueue::init(4);
        q.enqueue(1, 10).unwrap();
        q.enqueue(2, 90).unwrap();
        q.enqueue(3, 50).unwrap();
        let mut mlfq = MlfqState::new();
        let mut rng = Xorshift64::new(5);
        assert_eq!(pick_next(&mut q, SchedPolicy::Mlfq, &mut mlfq, &mut rng).unwrap(), 2);
    }

    /// Property 9: no runnable thread goes unselected across a full
    /// MLFQ_RESET_PERIOD window, since the reset sweep forces every
    /// thread still in the queue back up to the baseline priority.
    #[test]
    fn mlfq_reset_sweep_restores_every_priority_at_the_period_boundary() {
        let mut q = RunQueue::init(4);
        q.enqueue(1, 10).unwrap();
        q.enqueue(2, 10).unwrap();
        q.enqueue(3, 10).unwrap();
        let mut mlfq = MlfqState { cycles: MLFQ_RESET_PERIOD - 1 };
        let mut rng = Xorshift64::new(3);

        let picked = pick_next(&mut q, SchedPolicy::Mlfq, &mut mlfq, &mut rng).unwrap();
        assert_eq!(picked, 1);
        assert_eq!(mlfq.cycles(), MLFQ_RESET_PERIOD);
        assert!(q.entries().iter().all(|e| e.priority == MLFQ_RESET_PRIORITY));
    }

    #[test]
    fn empty_queue_is_an_error_under_every_policy() {
        let mut mlfq = MlfqState::new();
        let mut rng = Xorshift64::new(1);
        for policy in [SchedPolicy::Fifo, SchedPolicy::Random, SchedPolicy::Mlfq] {
            let mut q = RunQueue::init(2);
            assert!(matches!(pick_next(&mut q, policy, &mut mlfq, &mut rng), Err(SchedError::QueueEmpty)));
        }
    }
}
