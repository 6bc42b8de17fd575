//! Compile-time machine layout and sizing knobs.
//!
//! Mirrors the handful of `#define`s a real kernel would carry in a machine
//! header: page size, segment boundaries, and the table sizes that bound
//! the coremap, swap area, TLB, process table, and run queue. Tests that
//! need a smaller machine (see the end-to-end scenarios) build their own
//! [`MachineConfig`] rather than relying on these defaults.

/// Size of one page / physical frame / swap chunk, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Low bits of a page-aligned address.
pub const PAGE_FRAME_MASK: usize = !(PAGE_SIZE - 1);

/// Virtual addresses at or above this boundary belong to the kernel segment
/// and are direct-mapped; they never appear in the coremap's user mappings.
pub const KERNEL_SEG_BASE: usize = 0x8000_0000;

/// Fixed top of the user stack; the stack grows downward from here.
pub const USERSTACK: usize = KERNEL_SEG_BASE;

/// Default number of pages reserved for a process's stack.
pub const VM_STACKPAGES: usize = 12;

/// Default number of hardware TLB slots.
pub const NUM_TLB: usize = 8;

/// Default number of physical frames managed by the coremap.
pub const DEFAULT_NUM_FRAMES: usize = 64;

/// Default number of page-sized chunks in the swap area.
pub const DEFAULT_NUM_SWAP_CHUNKS: usize = 128;

/// Default size of the process table (pid 0 is reserved, never allocated).
pub const MAX_PROCESSES: usize = 128;

/// Default capacity of the scheduler's runnable ring.
pub const DEFAULT_RUNQUEUE_CAPACITY: usize = 256;

/// Number of scheduler invocations between MLFQ anti-starvation resets.
pub const MLFQ_RESET_PERIOD: u64 = 2000;

/// Priority every runnable thread is reset to on an MLFQ aging sweep.
pub const MLFQ_RESET_PRIORITY: u8 = 50;

/// Round `addr` down to its containing page boundary.
pub const fn page_align_down(addr: usize) -> usize {
    addr & PAGE_FRAME_MASK
}

/// Round `addr` up to the next page boundary.
pub const fn page_align_up(addr: usize) -> usize {
    (addr + PAGE_SIZE - 1) & PAGE_FRAME_MASK
}

/// Number of pages needed to cover `bytes`.
pub const fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE)
}

/// A sized machine description, so tests can exercise the end-to-end
/// scenarios (64 frames / 128 swap chunks / 8 TLB slots) without touching
/// the compile-time defaults above.
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    pub num_frames: usize,
    pub num_swap_chunks: usize,
    pub num_tlb: usize,
    pub max_processes: usize,
    pub runqueue_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            num_frames: DEFAULT_NUM_FRAMES,
            num_swap_chunks: DEFAULT_NUM_SWAP_CHUNKS,
            num_tlb: NUM_TLB,
            max_processes: MAX_PROCESSES,
            runqueue_capacity: DEFAULT_RUNQUEUE_CAPACITY,
        }
    }
}

impl MachineConfig {
    /// The 64-frame / 128-chunk / 8-slot machine the spec's scenarios are
    /// written against.
    pub const fn reference() -> Self {
        Self {
            num_frames: 64,
            num_swap_chunks: 128,
            num_tlb: 8,
            max_processes: 128,
            runqueue_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_helpers() {
        assert_eq!(page_align_down(0x1fff), 0x1000);
        assert_eq!(page_align_up(0x1001), 0x2000);
        assert_eq!(pages_for(4097), 2);
        assert_eq!(pages_for(0), 0);
    }
}
