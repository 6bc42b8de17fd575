//! RAII (Resource Acquisition Is Initialization) patterns for kernel resources.
//!
//! This module provides generic scope-guard helpers; the resource-specific
//! guards (frames, address spaces, process lifetime) are owned directly by
//! [`crate::mm::vmworld::VmWorld`] and [`crate::process::table`] instead,
//! since both already model their resources as values with an explicit
//! owner rather than reference-counted shared state.

use core::ops::{Deref, DerefMut};

use spin::MutexGuard;

/// RAII lock guard that logs acquisition and release.
pub struct TrackedMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    name: &'static str,
}

impl<'a, T> TrackedMutexGuard<'a, T> {
    /// Wrap an already-acquired guard, logging acquisition.
    pub fn new(guard: MutexGuard<'a, T>, name: &'static str) -> Self {
        println!("[RAII] Acquired lock: {}", name);
        Self { guard, name }
    }
}

impl<T> Drop for TrackedMutexGuard<'_, T> {
    fn drop(&mut self) {
        println!("[RAII] Released lock: {}", self.name);
    }
}

impl<T> Deref for TrackedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for TrackedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Macro to create a scope guard that runs `$e` when the enclosing scope
/// exits, on any path including an early return or panic unwind.
#[macro_export]
macro_rules! defer {
    ($e:expr) => {
        let _guard = $crate::raii::ScopeGuard::new(|| $e);
    };
}

/// Generic scope guard that runs cleanup code on drop.
pub struct ScopeGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    pub fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    /// Cancel the cleanup; the closure will not run.
    pub fn cancel(mut self) {
        self.cleanup = None;
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn scope_guard_runs_on_drop() {
        let cleaned = Cell::new(false);
        {
            let _guard = ScopeGuard::new(|| cleaned.set(true));
        }
        assert!(cleaned.get());
    }

    #[test]
    fn scope_guard_cancel_skips_cleanup() {
        let cleaned = Cell::new(false);
        {
            let guard = ScopeGuard::new(|| cleaned.set(true));
            guard.cancel();
        }
        assert!(!cleaned.get());
    }

    #[test]
    fn tracked_mutex_guard_derefs() {
        let m = spin::Mutex::new(41);
        let mut guard = TrackedMutexGuard::new(m.lock(), "test-lock");
        *guard += 1;
        assert_eq!(*guard, 42);
    }
}
