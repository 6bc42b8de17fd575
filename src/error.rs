//! Kernel error taxonomy for the VM, process, and scheduler core.
//!
//! Errors here are return values, not panics: a [`KernelError`] is something
//! the syscall layer can translate into an errno and hand back to user code.
//! Invariant violations (a KERNEL frame chosen as an eviction victim, a swap
//! lookup miss for a page that must be resident somewhere) are a different
//! class of failure entirely and are raised with `panic!` at the point of
//! discovery rather than threaded through `Result` — see the invariants
//! called out on [`crate::mm::coremap`] and [`crate::mm::swap`].

use core::fmt;

/// Main kernel error type for the VM/process/scheduler core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Bad flags, bad pid in `waitpid`, unsupported options: `EINVAL`.
    InvalidArgument {
        name: &'static str,
    },
    /// Null user pointer or failed user-memory copy: `EFAULT`.
    BadAddress {
        addr: usize,
    },
    /// No frame, no swap chunk, no pid slot, no address space: `ENOMEM`.
    OutOfMemory {
        resource: &'static str,
    },
    /// No such file descriptor: `EBADF`.
    BadFileDescriptor,
    /// Unknown syscall or unimplemented region count: `EUNIMP`/`ENOSYS`.
    NotImplemented {
        feature: &'static str,
    },
    /// Requested pid is not a child of the caller, or does not exist.
    ProcessNotFound {
        pid: u32,
    },
    /// Scheduler-specific failure.
    SchedulerError(SchedError),
}

/// Scheduler-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The run queue has no runnable thread to hand out.
    QueueEmpty,
    /// The run queue is at capacity and cannot accept another thread.
    QueueFull,
}

/// Result type alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { name } => write!(f, "invalid argument: {name}"),
            Self::BadAddress { addr } => write!(f, "bad address: {addr:#x}"),
            Self::OutOfMemory { resource } => write!(f, "out of memory: {resource}"),
            Self::BadFileDescriptor => write!(f, "bad file descriptor"),
            Self::NotImplemented { feature } => write!(f, "not implemented: {feature}"),
            Self::ProcessNotFound { pid } => write!(f, "process {pid} not found"),
            Self::SchedulerError(e) => write!(f, "scheduler error: {e:?}"),
        }
    }
}

impl From<SchedError> for KernelError {
    fn from(err: SchedError) -> Self {
        Self::SchedulerError(err)
    }
}
