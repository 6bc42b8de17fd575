//! Kernel print macros.
//!
//! On the host test target these forward to `std::println!` so that
//! `#[cfg(test)]` modules and `cargo test` output read normally; on a real
//! target they would forward to whatever console driver the arch layer
//! (out of scope for this crate) wires up. Prefer
//! [`crate::log_service::klog`] for anything that should survive past a
//! scrollback buffer.

#[cfg(not(target_os = "none"))]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => (std::println!($($arg)*));
}

#[cfg(target_os = "none")]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {};
}

/// Diagnostic print for kernel-only conditions a trap handler hits before
/// any per-process console is set up — e.g. `vm_fault` on a kernel-segment
/// address (spec §6). Thin wrapper over [`println!`]; kept distinct so call
/// sites read as a kernel diagnostic rather than ordinary console output.
#[macro_export]
macro_rules! kprintln {
    ($($arg:tt)*) => ($crate::println!($($arg)*));
}

#[cfg(test)]
mod tests {
    #[test]
    fn kprintln_forwards_to_println() {
        kprintln!("vm_fault: {:#x} is a kernel-segment address", 0x8000_0000usize);
    }
}
