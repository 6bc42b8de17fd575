//! Safe global initialization without `static mut`.

use spin::Mutex;

/// A lazily-initialized piece of global state guarded by a spinlock.
///
/// Used for singletons that need a non-const constructor (the log service's
/// circular buffer, for instance) but otherwise don't need a fully owned,
/// explicitly-threaded value the way [`crate::mm::vmworld::VmWorld`] does.
pub struct GlobalState<T> {
    inner: Mutex<Option<T>>,
}

impl<T> GlobalState<T> {
    /// Create new uninitialized global state.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Initialize the global state. Returns the value back as `Err` if
    /// already initialized.
    pub fn init(&self, value: T) -> Result<(), T> {
        let mut lock = self.inner.lock();
        if lock.is_some() {
            Err(value)
        } else {
            *lock = Some(value);
            Ok(())
        }
    }

    /// Run `f` with a shared reference, if initialized.
    pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> Option<R> {
        let lock = self.inner.lock();
        lock.as_ref().map(f)
    }

    /// Run `f` with a mutable reference, if initialized.
    pub fn with_mut<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> Option<R> {
        let mut lock = self.inner.lock();
        lock.as_mut().map(f)
    }
}

impl<T> Default for GlobalState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "alloc")]
    extern crate alloc;
    #[cfg(feature = "alloc")]
    use alloc::string::String;

    #[test]
    fn global_state_roundtrip() {
        let state: GlobalState<String> = GlobalState::new();
        assert!(state.with(|_| ()).is_none());

        assert!(state.init(String::from("hello")).is_ok());
        // Re-initializing returns the value back.
        assert_eq!(state.init(String::from("again")), Err(String::from("again")));

        state.with(|s| assert_eq!(s, "hello"));
        state.with_mut(|s| s.push_str(" world"));
        state.with(|s| assert_eq!(s, "hello world"));
    }
}
