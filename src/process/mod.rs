//! Process model: address spaces, the process table, and the fork/exit/
//! waitpid lifecycle built on top of the VM world.

pub mod address_space;
pub mod lifecycle;
pub mod table;

pub use address_space::{AddressSpace, Region};
pub use table::{ExitRendezvous, ProcessRecord, ProcessTable, WaitOptions, WaitPidOutcome};
