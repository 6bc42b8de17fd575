//! Demand-paged virtual memory, process lifecycle, and scheduler core for a
//! teaching-grade uniprocessor kernel.
//!
//! Covers the frame table, swap manager, software TLB, paging engine,
//! per-process address spaces, the process table's fork/exit/waitpid
//! rendezvous, and the FIFO/RANDOM/MLFQ run-queue scheduler. Device
//! drivers, the syscall dispatch table, an ELF loader, and SMP are out of
//! scope; see each module's own docs for the boundary it draws.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Bare-metal targets link the bump allocator; the host test target
// delegates to the system allocator so `Vec`/`String` work normally under
// `cargo test`.
#[cfg(target_os = "none")]
mod bump_alloc;
#[cfg(target_os = "none")]
#[global_allocator]
static ALLOCATOR: bump_alloc::UnsafeBumpAllocator = bump_alloc::UnsafeBumpAllocator::new();

#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

#[macro_use]
pub mod print;

pub mod clock;
pub mod config;
pub mod error;
pub mod log_service;
pub mod mm;
pub mod process;
pub mod raii;
pub mod rng;
pub mod sched;
pub mod spl;
pub mod sync;

pub use error::{KernelError, KernelResult, SchedError};
