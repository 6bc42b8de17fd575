//! Scheduler: a bounded FIFO run queue and the FIFO/RANDOM/MLFQ selection
//! policies that pick the next runnable thread from it.

pub mod policy;
pub mod queue;

pub use policy::{pick_next, MlfqState, SchedPolicy};
pub use queue::{RunQueue, RunnableThread};
