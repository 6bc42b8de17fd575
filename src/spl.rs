//! Scoped interrupt-disable critical sections ("spl", in the old BSD sense).
//!
//! The VM and scheduler cores protect `coremap`, `swaparea`, the TLB shadow
//! state, and the run queue by disabling interrupts rather than taking a
//! lock — the expectation is that every such critical section is short. We
//! model the interrupt-priority-level stack as a single atomic counter:
//! `splhigh()` raises it and returns a guard; dropping the guard restores
//! the level the caller observed on entry, on every exit path including an
//! early return or a panic unwind. Nesting is allowed and cheap.
//!
//! This is a software model, not a wrapper around a real interrupt
//! controller: the kernel this crate implements is architecture-agnostic
//! (see [`crate::mm`] and [`crate::sched`]), and the real "disable the CPU's
//! interrupt line" step belongs to the arch layer this crate treats as an
//! external collaborator.

use core::sync::atomic::{AtomicUsize, Ordering};

static IPL: AtomicUsize = AtomicUsize::new(0);

/// True while any `splhigh` guard is outstanding.
pub fn interrupts_disabled() -> bool {
    IPL.load(Ordering::Acquire) != 0
}

/// Current nesting depth, exposed for tests that want to assert balance.
pub fn depth() -> usize {
    IPL.load(Ordering::Acquire)
}

/// RAII guard returned by [`splhigh`]. Restores the prior interrupt level
/// when dropped, regardless of how the critical section was exited.
#[must_use = "dropping this guard immediately re-enables interrupts"]
pub struct SplGuard {
    _private: (),
}

impl Drop for SplGuard {
    fn drop(&mut self) {
        IPL.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Disable interrupts and return a guard that re-enables them on drop.
///
/// Safe to call while already inside a critical section: the level stack
/// nests, and interrupts stay disabled until the outermost guard drops.
pub fn splhigh() -> SplGuard {
    IPL.fetch_add(1, Ordering::AcqRel);
    SplGuard { _private: () }
}

/// Run `f` with interrupts disabled, restoring the prior level on return
/// (including via panic unwind).
pub fn with_interrupts_disabled<R>(f: impl FnOnce() -> R) -> R {
    let _guard = splhigh();
    f()
}
