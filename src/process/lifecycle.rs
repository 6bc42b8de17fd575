//! Process lifecycle orchestration: `fork`, `_exit`, and `waitpid` wired
//! together across the process table, an address space, and the VM world.
//!
//! Grounded in the source kernel's `proc_fork`/`sys_exit`/`sys_waitpid` call
//! chain (`process/lifecycle.rs`), with `execv` left out entirely — loading
//! a fresh ELF image onto an existing address space needs a loader and a
//! syscall-argument-copy path this core doesn't model.

#![allow(dead_code)]

use spin::Mutex;

use crate::error::KernelResult;
use crate::mm::swap::BlockDevice;
use crate::mm::vmworld::VmWorld;
use crate::process::address_space::AddressSpace;
use crate::process::table::{ProcessTable, WaitOptions, WaitPidOutcome};

/// `proc_fork`: allocate a pid for the child, duplicate the parent's address
/// space (each mapped page copied into a frame of its own — no
/// copy-on-write sharing), and record the parent/child relationship in the
/// table. Returns the child's pid and its freshly built address space.
pub fn fork<D: BlockDevice>(
    table: &Mutex<ProcessTable>,
    vm: &mut VmWorld<D>,
    parent_pid: u32,
    parent_as: &AddressSpace,
) -> KernelResult<(u32, AddressSpace)> {
    let child_pid = table.lock().pid_allocate(parent_pid)?;
    let child_as = parent_as.copy(child_pid, vm)?;
    Ok((child_pid, child_as))
}

/// `sys__exit` / `_exit`: mark `pid` exited with `code`, signaling any
/// parent already blocked in `waitpid`. The caller is responsible for
/// tearing down `pid`'s address space frames beforehand — this step only
/// updates the table so a later `waitpid` can reap it.
pub fn exit(table: &Mutex<ProcessTable>, pid: u32, code: i32) -> KernelResult<()> {
    table.lock().exit(pid, code)
}

/// `sys_waitpid`: reap `target_pid` for `caller_pid`, honoring `WNOHANG`.
///
/// A non-`WNOHANG` wait on a still-running child genuinely suspends the
/// caller: the table lock is held only long enough to look up the child's
/// [`crate::process::table::ExitRendezvous`] and is released before
/// blocking on it, so a concurrent `exit` for the same child can always
/// acquire the table and signal — blocking here while still holding the
/// table lock would deadlock that `exit` call (spec.md §8 Property 8).
pub fn waitpid(table: &Mutex<ProcessTable>, caller_pid: u32, target_pid: u32, options: u32) -> KernelResult<Option<(u32, i32)>> {
    let options = WaitOptions::from_raw(options)?;
    // Bind (rather than chain off the temporary) so the `MutexGuard` drops
    // here, before a `WouldBlock` arm calls `rendezvous.wait()` — chaining
    // would keep the guard alive for the whole `match`, holding the table
    // lock across the block and deadlocking the `exit` call that's
    // supposed to wake it.
    let outcome = table.lock().waitpid(caller_pid, target_pid, options)?;
    match outcome {
        WaitPidOutcome::Reaped(pid, code) => Ok(Some((pid, code))),
        WaitPidOutcome::NotReady => Ok(None),
        WaitPidOutcome::WouldBlock(rendezvous) => {
            rendezvous.wait();
            let (pid, code) = table.lock().reap(target_pid)?;
            Ok(Some((pid, code)))
        }
    }
}
