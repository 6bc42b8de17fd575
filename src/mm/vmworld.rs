//! The VM world: `coremap`, `swaparea`, the physical RAM backing them, and
//! the software TLB, collected into one owned value instead of scattered
//! process-wide statics. This is the redesign the global-mutable-state
//! pattern in the source kernel calls for: a single value created once at
//! boot, accessed through a narrow interface, and — because it is a plain
//! value rather than a web of global singletons — trivially constructible
//! in isolation for the LRU/MLFQ/eviction unit tests.
//!
//! Every operation that touches the frame table, swap area, or TLB runs
//! under [`crate::spl::with_interrupts_disabled`], matching the "mutation
//! guarded by interrupt-disable" concurrency model the VM core relies on.

#![allow(dead_code)]

use spin::Mutex;

use crate::clock::CLOCK;
use crate::config::{page_align_down, MachineConfig, PAGE_SIZE};
use crate::mm::coremap::CoreMap;
use crate::mm::paging::{self, FramePolicy, PagingError, PagingStats};
use crate::mm::ram::PhysicalRam;
use crate::mm::swap::{BlockDevice, InMemoryBlockDevice, SwapArea};
use crate::mm::tlb::{Tlb, TlbPolicy};
use crate::rng::Xorshift64;
use crate::spl::with_interrupts_disabled;
use crate::sync::GlobalState;

/// The three fault kinds `vm_fault` dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    Read,
    Write,
    ReadOnly,
}

/// The owned aggregate described in the module doc: everything the paging
/// engine needs to resolve a fault, gated by a single type instead of a
/// handful of independent global statics.
pub struct VmWorld<D: BlockDevice> {
    coremap: CoreMap,
    swap: SwapArea,
    ram: PhysicalRam,
    device: D,
    tlb: Tlb,
    rng: Xorshift64,
    stats: PagingStats,
    frame_policy: FramePolicy,
    kernel_seg_base: usize,
}

impl<D: BlockDevice> VmWorld<D> {
    /// `init_coremap` plus sizing the swap area and TLB: build a machine
    /// with `config`'s dimensions, a fresh (zeroed) physical RAM, and the
    /// given replacement policies.
    pub fn new(
        config: &MachineConfig,
        device: D,
        frame_policy: FramePolicy,
        tlb_policy: TlbPolicy,
        rng_seed: u64,
        coremap_base: usize,
        kernel_seg_base: usize,
    ) -> Self {
        Self {
            coremap: CoreMap::init(config.num_frames, coremap_base),
            swap: SwapArea::init(config.num_swap_chunks),
            ram: PhysicalRam::init(config.num_frames),
            device,
            tlb: Tlb::new(config.num_tlb, tlb_policy),
            rng: Xorshift64::new(rng_seed),
            stats: PagingStats::default(),
            frame_policy,
            kernel_seg_base,
        }
    }

    pub fn coremap(&self) -> &CoreMap {
        &self.coremap
    }

    pub fn swap(&self) -> &SwapArea {
        &self.swap
    }

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub fn stats(&self) -> PagingStats {
        self.stats
    }

    pub fn frame_policy(&self) -> FramePolicy {
        self.frame_policy
    }

    /// `alloc_page`: hand `vaddr` a fresh frame for `pid`.
    pub fn alloc_page(&mut self, vaddr: usize, pid: u32) -> Result<usize, PagingError> {
        with_interrupts_disabled(|| {
            paging::alloc_page(
                vaddr,
                pid,
                &mut self.coremap,
                &mut self.swap,
                &mut self.ram,
                &mut self.device,
                &mut self.tlb,
                &mut self.rng,
                self.frame_policy,
                &mut self.stats,
                self.kernel_seg_base,
                CLOCK.now(),
            )
        })
    }

    /// `alloc_page` followed by zeroing the frame, for `as_prepare_load`
    /// handing out a fresh page to a process.
    pub fn alloc_and_zero(&mut self, vaddr: usize, pid: u32) -> Result<usize, PagingError> {
        let paddr = self.alloc_page(vaddr, pid)?;
        with_interrupts_disabled(|| {
            let idx = self.coremap.frame_index(paddr);
            self.ram.zero(idx);
        });
        Ok(paddr)
    }

    /// `handle_page_fault`: resolve a fault, update LRU state, and install
    /// the resulting mapping into the TLB.
    pub fn handle_page_fault(&mut self, vaddr: usize, pid: u32) -> Result<usize, PagingError> {
        with_interrupts_disabled(|| {
            paging::handle_page_fault(
                vaddr,
                pid,
                &mut self.coremap,
                &mut self.swap,
                &mut self.ram,
                &mut self.device,
                &mut self.tlb,
                &mut self.rng,
                self.frame_policy,
                &mut self.stats,
                self.kernel_seg_base,
                CLOCK.now(),
            )
        })
    }

    /// `vm_fault`: the entry point a trap handler calls on a TLB miss.
    /// `READONLY` is an invariant violation (this core never marks a page
    /// read-only; READ and WRITE are handled identically). `faultaddress
    /// == 0` returns `Ok(0)` — no mapping, the caller handles it. Addresses
    /// at or above the kernel segment base are direct-mapped and never
    /// reach the paging engine: print a diagnostic and return `Ok(0)`.
    pub fn vm_fault(&mut self, fault_type: FaultType, faultaddress: usize, pid: u32) -> Result<usize, PagingError> {
        if fault_type == FaultType::ReadOnly {
            panic!("VM_FAULT_READONLY at {faultaddress:#x}");
        }
        if faultaddress == 0 {
            return Ok(0);
        }
        if faultaddress >= self.kernel_seg_base {
            crate::kprintln!("vm_fault: {faultaddress:#x} is a kernel-segment address, no mapping");
            return Ok(0);
        }
        self.handle_page_fault(page_align_down(faultaddress), pid)
    }

    /// `kpage_nalloc`: `n` contiguous direct-mapped kernel frames.
    pub fn kpage_nalloc(&mut self, n: usize) -> Option<usize> {
        with_interrupts_disabled(|| {
            paging::kpage_nalloc(
                n,
                &mut self.coremap,
                &mut self.swap,
                &mut self.ram,
                &mut self.device,
                &mut self.tlb,
                &mut self.stats,
                self.kernel_seg_base,
                CLOCK.now(),
            )
        })
    }

    /// `as_activate`: flush the TLB entirely. Must leave every slot
    /// invalid (testable property 4).
    pub fn activate(&mut self) {
        with_interrupts_disabled(|| self.tlb.invalidate_all());
    }

    /// Read `PAGE_SIZE` bytes from the resident or swapped-in page at
    /// `(vaddr, pid)`, faulting it in first if necessary.
    pub fn read_page(&mut self, vaddr: usize, pid: u32) -> Result<[u8; PAGE_SIZE], PagingError> {
        let paddr = self.handle_page_fault(vaddr, pid)?;
        let idx = self.coremap.frame_index(paddr);
        Ok(*self.ram.read(idx))
    }

    /// Overwrite the resident page at `(vaddr, pid)` with `bytes`, faulting
    /// it in first if necessary.
    pub fn write_page(&mut self, vaddr: usize, pid: u32, bytes: &[u8; PAGE_SIZE]) -> Result<(), PagingError> {
        let paddr = self.handle_page_fault(vaddr, pid)?;
        let idx = self.coremap.frame_index(paddr);
        with_interrupts_disabled(|| self.ram.write(idx, bytes));
        Ok(())
    }

    /// `as_copy`'s per-page step: allocate a frame for `(vaddr, to_pid)`
    /// and copy the current bytes of `(vaddr, from_pid)` into it. Used by
    /// fork to give the child a private copy of every parent page.
    pub fn copy_page(&mut self, vaddr: usize, from_pid: u32, to_pid: u32) -> Result<(), PagingError> {
        let bytes = self.read_page(vaddr, from_pid)?;
        let paddr = self.alloc_page(vaddr, to_pid)?;
        let idx = self.coremap.frame_index(paddr);
        with_interrupts_disabled(|| self.ram.write(idx, &bytes));
        Ok(())
    }

    /// Frame-table and swap-area bijection invariants (testable property 1).
    pub fn check_invariants(&self) -> bool {
        self.coremap.check_bijection() && self.swap.check_bijection()
    }
}

/// Process-wide VM world for production use, parked behind the same
/// lazily-initialized, mutex-guarded global state the log service uses.
static VM_WORLD: GlobalState<Mutex<VmWorld<InMemoryBlockDevice>>> = GlobalState::new();

/// Build the process-wide VM world. Must run once during boot, after the
/// swap device has been sized.
pub fn vm_world_init(
    config: &MachineConfig,
    frame_policy: FramePolicy,
    tlb_policy: TlbPolicy,
    rng_seed: u64,
    coremap_base: usize,
    kernel_seg_base: usize,
) {
    let device = InMemoryBlockDevice::new(config.num_swap_chunks);
    let world = VmWorld::new(config, device, frame_policy, tlb_policy, rng_seed, coremap_base, kernel_seg_base);
    let _ = VM_WORLD.init(Mutex::new(world));
}

/// Run `f` against the process-wide VM world. Returns `None` if
/// [`vm_world_init`] has not run yet.
pub fn with_vm_world<R>(f: impl FnOnce(&mut VmWorld<InMemoryBlockDevice>) -> R) -> Option<R> {
    VM_WORLD.with_mut(|lock| f(&mut lock.lock()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(frames: usize, chunks: usize, tlb: usize) -> VmWorld<InMemoryBlockDevice> {
        let config = MachineConfig {
            num_frames: frames,
            num_swap_chunks: chunks,
            num_tlb: tlb,
            max_processes: 8,
            runqueue_capacity: 8,
        };
        VmWorld::new(
            &config,
            InMemoryBlockDevice::new(chunks),
            FramePolicy::Lru,
            TlbPolicy::Nru,
            42,
            0x1000,
            0x8000_0000,
        )
    }

    #[test]
    fn alloc_then_fault_round_trips_bytes() {
        let mut vm = world(4, 4, 4);
        vm.alloc_and_zero(0x4000, 1).unwrap();
        vm.write_page(0x4000, 1, &[7u8; PAGE_SIZE]).unwrap();
        assert_eq!(vm.read_page(0x4000, 1).unwrap(), [7u8; PAGE_SIZE]);
        assert!(vm.check_invariants());
    }

    #[test]
    fn activate_clears_tlb() {
        let mut vm = world(2, 2, 2);
        vm.alloc_and_zero(0x1000, 1).unwrap();
        vm.handle_page_fault(0x1000, 1).unwrap();
        assert_eq!(vm.tlb().valid_count(), 1);
        vm.activate();
        assert_eq!(vm.tlb().valid_count(), 0);
    }

    #[test]
    fn copy_page_gives_child_an_independent_frame() {
        let mut vm = world(4, 4, 4);
        vm.alloc_and_zero(0x7000, 1).unwrap();
        vm.write_page(0x7000, 1, &[0xABu8; PAGE_SIZE]).unwrap();

        vm.copy_page(0x7000, 1, 2).unwrap();
        assert_eq!(vm.read_page(0x7000, 2).unwrap(), [0xABu8; PAGE_SIZE]);

        vm.write_page(0x7000, 2, &[0xCDu8; PAGE_SIZE]).unwrap();
        assert_eq!(vm.read_page(0x7000, 1).unwrap(), [0xABu8; PAGE_SIZE]);
    }

    #[test]
    fn lru_eviction_picks_the_oldest_touched_frame() {
        // The only test in this crate that drives the global CLOCK forward;
        // every other test either ignores timestamps or builds its own local
        // Clock, so there's no other writer to race against here.
        let mut vm = world(2, 2, 2);
        vm.alloc_and_zero(0x1000, 1).unwrap();
        CLOCK.set(1, 0);
        vm.handle_page_fault(0x1000, 1).unwrap();
        vm.alloc_and_zero(0x2000, 1).unwrap();
        CLOCK.set(2, 0);
        vm.handle_page_fault(0x2000, 1).unwrap();

        // Both frames full; 0x1000 is older and should be the one evicted.
        CLOCK.set(3, 0);
        vm.alloc_and_zero(0x3000, 1).unwrap();
        assert_eq!(vm.coremap().find_mapping(0x1000, 1), None);
        assert_eq!(vm.swap().used_count(), 1);
        CLOCK.set(0, 0);
    }

    #[test]
    fn vm_fault_null_address_returns_zero_without_faulting() {
        let mut vm = world(2, 2, 2);
        assert_eq!(vm.vm_fault(FaultType::Read, 0, 1), Ok(0));
        assert!(vm.coremap().used_count() == 0);
    }

    #[test]
    fn vm_fault_kernel_segment_address_returns_zero_without_faulting() {
        let mut vm = world(2, 2, 2);
        assert_eq!(vm.vm_fault(FaultType::Write, 0x8000_1000, 1), Ok(0));
        assert!(vm.coremap().used_count() == 0);
    }

    #[test]
    fn vm_fault_resolves_like_handle_page_fault() {
        let mut vm = world(2, 2, 2);
        vm.alloc_and_zero(0x4000, 1).unwrap();
        let paddr = vm.vm_fault(FaultType::Read, 0x4000, 1).unwrap();
        assert_eq!(vm.coremap().find_mapping(0x4000, 1), Some(vm.coremap().frame_index(paddr)));
    }

    #[test]
    #[should_panic(expected = "VM_FAULT_READONLY")]
    fn vm_fault_readonly_is_fatal() {
        let mut vm = world(2, 2, 2);
        let _ = vm.vm_fault(FaultType::ReadOnly, 0x4000, 1);
    }
}
