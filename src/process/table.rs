//! Process table: pid allocation, parent linkage, and the `_exit`/`waitpid`
//! rendezvous.
//!
//! Grounded in the global `ProcessTable` behind a `BTreeMap<ProcessId, _>`
//! the source kernel keeps, trimmed to a fixed-size `Vec<Option<_>>` slab
//! since this core's process record is a handful of scalars rather than a
//! heap-owning PCB.

#![allow(dead_code)]

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::error::{KernelError, KernelResult};

/// Options accepted by [`ProcessTable::waitpid`]. The source kernel's
/// `WaitOptions` carries `WUNTRACED`/`WCONTINUED` too; this core's contract
/// only recognizes `WNOHANG`, and rejects anything else as `EINVAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions(u32);

impl WaitOptions {
    pub const NONE: u32 = 0;
    pub const WNOHANG: u32 = 1;

    pub fn from_raw(flags: u32) -> KernelResult<Self> {
        match flags {
            Self::NONE | Self::WNOHANG => Ok(Self(flags)),
            _ => Err(KernelError::InvalidArgument {
                name: "waitpid options",
            }),
        }
    }

    pub fn is_nohang(&self) -> bool {
        self.0 == Self::WNOHANG
    }
}

/// The "exit condition variable + its lock" spec.md §3 lists as a field of
/// the process record, named by pid. A real thread-park/wake pair needs a
/// scheduler to block into, which is out of this core's scope (§1); what's
/// modeled here is the rendezvous *contract* itself — `wait` only returns
/// after a matching `signal`, busy-polling the shared flag in between —
/// rather than stubbing the whole operation out as unimplemented. `signal`
/// and the `is_exited`/`exitcode` reads use `Release`/`Acquire` ordering so
/// a waiter observes `exitcode` correctly once `is_exited()` reads true.
pub struct ExitRendezvous {
    exited: AtomicBool,
    exitcode: AtomicI32,
}

impl ExitRendezvous {
    fn new() -> Self {
        Self {
            exited: AtomicBool::new(false),
            exitcode: AtomicI32::new(0),
        }
    }

    /// `_exit`'s half of the rendezvous: record the exit code and wake
    /// anyone blocked in `wait`.
    fn signal(&self, code: i32) {
        self.exitcode.store(code, Ordering::Release);
        self.exited.store(true, Ordering::Release);
    }

    fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    fn exitcode(&self) -> i32 {
        self.exitcode.load(Ordering::Acquire)
    }

    /// Block the calling thread until `signal` has been called.
    pub fn wait(&self) {
        while !self.is_exited() {
            core::hint::spin_loop();
        }
    }
}

/// One process table slot.
#[derive(Clone)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: u32,
    rendezvous: Arc<ExitRendezvous>,
}

impl ProcessRecord {
    fn new(pid: u32, parent_pid: u32) -> Self {
        Self {
            pid,
            parent_pid,
            rendezvous: Arc::new(ExitRendezvous::new()),
        }
    }

    pub fn exited(&self) -> bool {
        self.rendezvous.is_exited()
    }

    pub fn exitcode(&self) -> i32 {
        self.rendezvous.exitcode()
    }
}

/// What [`ProcessTable::waitpid`] learned, handed back to the caller to
/// finish the job. `WouldBlock` carries the child's rendezvous handle so
/// the caller can block on it *without* holding any table-wide lock —
/// blocking inside this method, under a lock, would deadlock the `_exit`
/// call that's supposed to wake it.
#[derive(Clone)]
pub enum WaitPidOutcome {
    /// The child had already exited; its slot is now freed.
    Reaped(u32, i32),
    /// `WNOHANG` was requested and the child is still running.
    NotReady,
    /// The child is still running and the caller must block on this
    /// rendezvous, then call [`ProcessTable::reap`] once it returns.
    WouldBlock(Arc<ExitRendezvous>),
}

/// `MAX_PROCESSES`-slot table indexed by pid; slot 0 is reserved and never
/// allocated.
pub struct ProcessTable {
    slots: Vec<Option<ProcessRecord>>,
}

impl ProcessTable {
    pub fn init(max_processes: usize) -> Self {
        Self {
            slots: vec![None; max_processes],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn exists(&self, pid: u32) -> bool {
        self.get(pid).is_some()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        if pid == 0 {
            return None;
        }
        self.slots.get(pid as usize).and_then(|s| s.as_ref())
    }

    /// `pid_allocate`: first empty slot at index `>= 1`.
    pub fn pid_allocate(&mut self, parent_pid: u32) -> KernelResult<u32> {
        for i in 1..self.slots.len() {
            if self.slots[i].is_none() {
                self.slots[i] = Some(ProcessRecord::new(i as u32, parent_pid));
                return Ok(i as u32);
            }
        }
        Err(KernelError::OutOfMemory {
            resource: "process table",
        })
    }

    /// `_exit`: mark `pid` exited with `code` and signal its rendezvous, so
    /// a parent already blocked in `wait()` wakes up. The slot is only
    /// freed by a later successful `waitpid`/`reap` from its parent.
    pub fn exit(&mut self, pid: u32, code: i32) -> KernelResult<()> {
        let slot = self
            .slots
            .get_mut(pid as usize)
            .and_then(|s| s.as_mut())
            .ok_or(KernelError::ProcessNotFound { pid })?;
        slot.rendezvous.signal(code);
        Ok(())
    }

    /// `waitpid`'s non-blocking half: validate `caller_pid` is actually
    /// `target_pid`'s parent (gating on `parent_pid`, per the documented
    /// fix to the source's `pid > curthread.pid` heuristic), then report
    /// what's needed to finish — reap immediately, report not-ready, or
    /// hand back the rendezvous to block on. Never blocks itself.
    pub fn waitpid(&mut self, caller_pid: u32, target_pid: u32, options: WaitOptions) -> KernelResult<WaitPidOutcome> {
        let record = self.get(target_pid).cloned().ok_or(KernelError::ProcessNotFound { pid: target_pid })?;
        if record.parent_pid != caller_pid {
            return Err(KernelError::ProcessNotFound { pid: target_pid });
        }

        if record.exited() {
            self.slots[target_pid as usize] = None;
            return Ok(WaitPidOutcome::Reaped(record.pid, record.exitcode()));
        }

        if options.is_nohang() {
            return Ok(WaitPidOutcome::NotReady);
        }

        Ok(WaitPidOutcome::WouldBlock(record.rendezvous))
    }

    /// Free `target_pid`'s slot once its rendezvous has signaled (i.e.
    /// after blocking on the handle [`Self::waitpid`] returned via
    /// [`WaitPidOutcome::WouldBlock`]). Fatal-by-`KernelError` if the slot
    /// is gone or the child hasn't actually exited yet — callers only
    /// reach this after `ExitRendezvous::wait()` returns.
    pub fn reap(&mut self, target_pid: u32) -> KernelResult<(u32, i32)> {
        let record = self.get(target_pid).cloned().ok_or(KernelError::ProcessNotFound { pid: target_pid })?;
        if !record.exited() {
            return Err(KernelError::InvalidArgument {
                name: "reap of a still-running process",
            });
        }
        self.slots[target_pid as usize] = None;
        Ok((record.pid, record.exitcode()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_allocate_skips_reserved_slot_zero() {
        let mut table = ProcessTable::init(4);
        let pid = table.pid_allocate(0).unwrap();
        assert_eq!(pid, 1);
        assert!(table.exists(1));
    }

    #[test]
    fn allocate_fails_when_table_is_full() {
        let mut table = ProcessTable::init(2);
        table.pid_allocate(0).unwrap();
        assert!(matches!(
            table.pid_allocate(0),
            Err(KernelError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn waitpid_reaps_an_exited_child_and_frees_its_slot() {
        let mut table = ProcessTable::init(4);
        let child = table.pid_allocate(1).unwrap();
        table.exit(child, 42).unwrap();

        let outcome = table.waitpid(1, child, WaitOptions::from_raw(WaitOptions::NONE).unwrap()).unwrap();
        assert!(matches!(outcome, WaitPidOutcome::Reaped(pid, 42) if pid == child));
        assert!(!table.exists(child));
    }

    #[test]
    fn wnohang_returns_not_ready_for_a_still_running_child() {
        let mut table = ProcessTable::init(4);
        let child = table.pid_allocate(1).unwrap();
        let outcome = table.waitpid(1, child, WaitOptions::from_raw(WaitOptions::WNOHANG).unwrap()).unwrap();
        assert!(matches!(outcome, WaitPidOutcome::NotReady));
        assert!(table.exists(child));
    }

    #[test]
    fn non_wnohang_on_a_running_child_hands_back_a_rendezvous() {
        let mut table = ProcessTable::init(4);
        let child = table.pid_allocate(1).unwrap();
        let outcome = table.waitpid(1, child, WaitOptions::from_raw(WaitOptions::NONE).unwrap()).unwrap();
        let rendezvous = match outcome {
            WaitPidOutcome::WouldBlock(r) => r,
            _ => panic!("expected WouldBlock"),
        };
        assert!(!rendezvous.is_exited());
        table.exit(child, 9).unwrap();
        rendezvous.wait();
        assert_eq!(rendezvous.exitcode(), 9);
        let (pid, code) = table.reap(child).unwrap();
        assert_eq!((pid, code), (child, 9));
        assert!(!table.exists(child));
    }

    #[test]
    fn waitpid_rejects_a_caller_that_is_not_the_parent() {
        let mut table = ProcessTable::init(4);
        let child = table.pid_allocate(1).unwrap();
        table.exit(child, 0).unwrap();
        assert!(matches!(
            table.waitpid(2, child, WaitOptions::from_raw(0).unwrap()),
            Err(KernelError::ProcessNotFound { .. })
        ));
    }

    #[test]
    fn waitpid_rejects_unsupported_options() {
        assert!(WaitOptions::from_raw(7).is_err());
    }

    #[test]
    fn reap_rejects_a_still_running_process() {
        let mut table = ProcessTable::init(4);
        let child = table.pid_allocate(1).unwrap();
        assert!(matches!(
            table.reap(child),
            Err(KernelError::InvalidArgument { .. })
        ));
    }
}
