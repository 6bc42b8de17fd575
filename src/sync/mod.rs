//! Synchronization helpers that don't fit the `spl` critical-section model.

pub mod once_lock;

pub use once_lock::GlobalState;
