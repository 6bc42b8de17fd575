//! Paging engine: glues the frame table (A), the swap manager (B), and the
//! TLB controller (C) into the handful of operations that actually resolve
//! a virtual address to a physical frame.
//!
//! These are free functions taking explicit references to the pieces they
//! need rather than methods on one god-object, so each operation stays unit
//! testable on its own; [`crate::mm::vmworld::VmWorld`] is the owning value
//! that holds the real instances and calls through to these under a
//! critical section.

#![allow(dead_code, clippy::too_many_arguments)]

extern crate alloc;

use alloc::vec::Vec;

use crate::clock::Instant;
use crate::config::{page_align_down, PAGE_SIZE};
use crate::mm::coremap::CoreMap;
use crate::mm::ram::PhysicalRam;
use crate::mm::swap::{BlockDevice, SwapArea};
use crate::mm::tlb::Tlb;
use crate::rng::Xorshift64;

/// Which policy `snatch_a_page` and `kpage_nalloc` use to choose an
/// eviction victim when no frame is free. Distinct from [`crate::mm::tlb::TlbPolicy`]:
/// the frame table and the TLB each have their own independent choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePolicy {
    Random,
    Lru,
}

/// Failure a caller above this layer must react to (typically by killing
/// the current process) rather than one this layer can resolve itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// `get_empty_chunk` found no free swap chunk during an eviction.
    SwapExhausted,
}

/// Running counters the paging engine updates as it works, mirroring the
/// `page_faults` / `tlb_faults` / `async writes` statistics a real kernel
/// would expose to `vmstat`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PagingStats {
    /// Faults resolved by reading a page back in from swap.
    pub page_faults: u64,
    /// Faults resolved by a frame that was already resident.
    pub tlb_faults: u64,
    /// Pages written out to swap to make room for a new mapping.
    pub page_writes: u64,
}

fn select_victim(coremap: &CoreMap, policy: FramePolicy, rng: &mut Xorshift64) -> usize {
    match policy {
        FramePolicy::Random => coremap.replace_rnd_page(rng),
        FramePolicy::Lru => coremap.replace_lru_page(),
    }
}

/// `snatch_a_page`: bitmap-allocate a free frame, or evict a victim.
///
/// On eviction, the victim's bytes are written to a fresh swap chunk, any
/// TLB entry mapping it is invalidated, and its coremap entry is cleared
/// before the now-free physical address is handed back.
pub fn snatch_a_page<D: BlockDevice>(
    coremap: &mut CoreMap,
    swap: &mut SwapArea,
    ram: &mut PhysicalRam,
    device: &mut D,
    tlb: &mut Tlb,
    rng: &mut Xorshift64,
    policy: FramePolicy,
    stats: &mut PagingStats,
) -> Result<usize, PagingError> {
    if let Some(idx) = coremap.find_free() {
        return Ok(coremap.paddr_of(idx));
    }

    let victim_idx = select_victim(coremap, policy, rng);
    let victim = *coremap.entry(victim_idx);
    let chunk = swap.get_empty_chunk().ok_or(PagingError::SwapExhausted)?;
    let frame_idx = coremap.frame_index(victim.paddr);
    let page_bytes = *ram.read(frame_idx);

    swap.swapout(device, chunk, &page_bytes, victim.vaddr, victim.pid);
    tlb.invalidate(victim.paddr);
    coremap.remove_ppage(victim.paddr);
    stats.page_writes += 1;

    Ok(victim.paddr)
}

/// `load_page_into_memory`: locate `(vaddr, pid)` in swap, bring it back
/// into a fresh frame, and register the new mapping.
pub fn load_page_into_memory<D: BlockDevice>(
    vaddr: usize,
    pid: u32,
    coremap: &mut CoreMap,
    swap: &mut SwapArea,
    ram: &mut PhysicalRam,
    device: &mut D,
    tlb: &mut Tlb,
    rng: &mut Xorshift64,
    policy: FramePolicy,
    stats: &mut PagingStats,
    kernel_seg_base: usize,
    now: Instant,
) -> Result<usize, PagingError> {
    let chunk = swap.get_spage(vaddr, pid);
    let paddr = snatch_a_page(coremap, swap, ram, device, tlb, rng, policy, stats)?;
    let frame_idx = coremap.frame_index(paddr);

    let mut buf = [0u8; PAGE_SIZE];
    swap.swapin(device, chunk, &mut buf);
    ram.write(frame_idx, &buf);

    coremap.add_ppage(vaddr, paddr, pid, kernel_seg_base, now);
    coremap.mark_clean_swapped(paddr);

    Ok(paddr)
}

/// `get_ppage`: find `(vaddr, pid)` resident in the coremap, or bring it
/// back in from swap if not. `pid == 0` also matches kernel pages, per the
/// coremap's own `find_mapping` contract.
pub fn get_ppage<D: BlockDevice>(
    vaddr: usize,
    pid: u32,
    coremap: &mut CoreMap,
    swap: &mut SwapArea,
    ram: &mut PhysicalRam,
    device: &mut D,
    tlb: &mut Tlb,
    rng: &mut Xorshift64,
    policy: FramePolicy,
    stats: &mut PagingStats,
    kernel_seg_base: usize,
    now: Instant,
) -> Result<usize, PagingError> {
    if let Some(idx) = coremap.find_mapping(vaddr, pid) {
        stats.tlb_faults += 1;
        return Ok(coremap.paddr_of(idx));
    }
    stats.page_faults += 1;
    load_page_into_memory(
        vaddr,
        pid,
        coremap,
        swap,
        ram,
        device,
        tlb,
        rng,
        policy,
        stats,
        kernel_seg_base,
        now,
    )
}

/// `handle_page_fault`: resolve a fault at `vaddr` for `pid`, update LRU
/// timestamps if that's the configured frame policy, and install the
/// mapping into the TLB.
pub fn handle_page_fault<D: BlockDevice>(
    vaddr: usize,
    pid: u32,
    coremap: &mut CoreMap,
    swap: &mut SwapArea,
    ram: &mut PhysicalRam,
    device: &mut D,
    tlb: &mut Tlb,
    rng: &mut Xorshift64,
    policy: FramePolicy,
    stats: &mut PagingStats,
    kernel_seg_base: usize,
    now: Instant,
) -> Result<usize, PagingError> {
    let aligned = page_align_down(vaddr);
    let paddr = get_ppage(
        aligned,
        pid,
        coremap,
        swap,
        ram,
        device,
        tlb,
        rng,
        policy,
        stats,
        kernel_seg_base,
        now,
    )?;
    if policy == FramePolicy::Lru {
        coremap.touch(paddr, now);
    }
    tlb.insert(aligned, paddr, rng, now);
    Ok(page_align_down(paddr))
}

/// `alloc_page`: hand `vaddr` a fresh physical frame for `pid`.
pub fn alloc_page<D: BlockDevice>(
    vaddr: usize,
    pid: u32,
    coremap: &mut CoreMap,
    swap: &mut SwapArea,
    ram: &mut PhysicalRam,
    device: &mut D,
    tlb: &mut Tlb,
    rng: &mut Xorshift64,
    policy: FramePolicy,
    stats: &mut PagingStats,
    kernel_seg_base: usize,
    now: Instant,
) -> Result<usize, PagingError> {
    let paddr = snatch_a_page(coremap, swap, ram, device, tlb, rng, policy, stats)?;
    coremap.add_ppage(vaddr, paddr, pid, kernel_seg_base, now);
    Ok(paddr)
}

/// The longest contiguous run of frame indices, in frame order, for which
/// `eligible` holds. Frame order matches physical-address order, since the
/// coremap lays frames out at `coremap_base + i * PAGE_SIZE`.
fn longest_run(num_frames: usize, eligible: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = 0;
    let mut run_len = 0;
    for i in 0..num_frames {
        if eligible(i) {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            if best.is_none_or(|(_, best_len)| run_len > best_len) {
                best = Some((run_start, run_len));
            }
        } else {
            run_len = 0;
        }
    }
    best
}

/// `kpage_nalloc`: allocate `n` contiguous kernel frames, direct-mapped at
/// `kernel_seg_base + paddr`. Prefers a contiguous free run; failing that,
/// evicts the longest non-KERNEL run long enough to hold `n` frames.
/// Returns `None` if neither is possible (the spec's "returns 0").
pub fn kpage_nalloc<D: BlockDevice>(
    n: usize,
    coremap: &mut CoreMap,
    swap: &mut SwapArea,
    ram: &mut PhysicalRam,
    device: &mut D,
    tlb: &mut Tlb,
    stats: &mut PagingStats,
    kernel_seg_base: usize,
    now: Instant,
) -> Option<usize> {
    if n == 0 {
        return None;
    }

    if let Some((start, len)) = longest_run(coremap.num_frames(), |i| coremap.entry(i).is_free()) {
        if len >= n {
            for i in start..start + n {
                let paddr = coremap.paddr_of(i);
                let vaddr = kernel_seg_base + paddr;
                coremap.add_ppage(vaddr, paddr, 0, kernel_seg_base, now);
            }
            return Some(coremap.paddr_of(start));
        }
    }

    let (start, len) = longest_run(coremap.num_frames(), |i| !coremap.entry(i).is_kernel())?;
    if len < n {
        return None;
    }

    let victims: Vec<_> = (start..start + n)
        .filter(|&i| !coremap.entry(i).is_free())
        .map(|i| *coremap.entry(i))
        .collect();
    for victim in &victims {
        let chunk = swap.get_empty_chunk()?;
        let frame_idx = coremap.frame_index(victim.paddr);
        let bytes = *ram.read(frame_idx);
        swap.swapout(device, chunk, &bytes, victim.vaddr, victim.pid);
        tlb.invalidate(victim.paddr);
        coremap.remove_ppage(victim.paddr);
        stats.page_writes += 1;
    }

    for i in start..start + n {
        let paddr = coremap.paddr_of(i);
        let vaddr = kernel_seg_base + paddr;
        coremap.add_ppage(vaddr, paddr, 0, kernel_seg_base, now);
    }
    Some(coremap.paddr_of(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::swap::InMemoryBlockDevice;

    const KBASE: usize = 0x8000_0000;

    fn machine(frames: usize, chunks: usize) -> (CoreMap, SwapArea, PhysicalRam, InMemoryBlockDevice, Tlb, Xorshift64, PagingStats) {
        (
            CoreMap::init(frames, 0x1000),
            SwapArea::init(chunks),
            PhysicalRam::init(frames),
            InMemoryBlockDevice::new(chunks),
            Tlb::new(4, crate::mm::tlb::TlbPolicy::Random),
            Xorshift64::new(7),
            PagingStats::default(),
        )
    }

    #[test]
    fn alloc_page_marks_frame_used() {
        let (mut cm, mut sw, mut ram, mut dev, mut tlb, mut rng, mut stats) = machine(4, 4);
        let paddr = alloc_page(
            0x1000, 1, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng,
            FramePolicy::Random, &mut stats, KBASE, Instant::ZERO,
        )
        .unwrap();
        assert_eq!(cm.find_mapping(0x1000, 1), Some(cm.frame_index(paddr)));
        assert_eq!(cm.used_count(), 1);
    }

    #[test]
    fn snatch_evicts_when_full_and_writes_to_swap() {
        let (mut cm, mut sw, mut ram, mut dev, mut tlb, mut rng, mut stats) = machine(2, 4);
        alloc_page(0x1000, 1, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Random, &mut stats, KBASE, Instant::ZERO).unwrap();
        alloc_page(0x2000, 1, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Random, &mut stats, KBASE, Instant::ZERO).unwrap();
        assert_eq!(cm.used_count(), 2);

        let paddr = snatch_a_page(&mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Random, &mut stats).unwrap();
        assert_eq!(sw.used_count(), 1);
        assert_eq!(stats.page_writes, 1);
        assert!(cm.find_free().is_none() || cm.paddr_of(cm.frame_index(paddr)) == paddr);
    }

    #[test]
    fn fault_then_reload_round_trips_through_swap() {
        let (mut cm, mut sw, mut ram, mut dev, mut tlb, mut rng, mut stats) = machine(1, 2);
        let paddr = alloc_page(0x4000, 9, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Random, &mut stats, KBASE, Instant::ZERO).unwrap();
        ram.write(cm.frame_index(paddr), &[0xAAu8; PAGE_SIZE]);

        // Forces eviction of 0x4000 to make room for 0x5000.
        let paddr2 = alloc_page(0x5000, 9, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Random, &mut stats, KBASE, Instant::ZERO).unwrap();
        assert_eq!(cm.find_mapping(0x4000, 9), None);
        assert_eq!(sw.used_count(), 1);

        let back = get_ppage(0x4000, 9, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Random, &mut stats, KBASE, Instant::ZERO).unwrap();
        assert_eq!(ram.read(cm.frame_index(back)), &[0xAAu8; PAGE_SIZE]);
        assert_eq!(sw.used_count(), 1); // 0x5000 evicted in turn to make room
        let _ = paddr2;
    }

    #[test]
    fn handle_page_fault_installs_tlb_mapping() {
        let (mut cm, mut sw, mut ram, mut dev, mut tlb, mut rng, mut stats) = machine(2, 2);
        alloc_page(0x3000, 1, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Lru, &mut stats, KBASE, Instant::ZERO).unwrap();
        let paddr = handle_page_fault(0x3000, 1, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut rng, FramePolicy::Lru, &mut stats, KBASE, Instant::new(5, 0)).unwrap();
        assert_eq!(tlb.lookup(0x3000), Some(paddr));
        assert_eq!(cm.entry(cm.frame_index(paddr)).atime, Instant::new(5, 0));
    }

    #[test]
    fn kpage_nalloc_prefers_free_run_and_direct_maps() {
        let (mut cm, mut sw, mut ram, mut dev, mut tlb, _rng, mut stats) = machine(4, 4);
        let paddr = kpage_nalloc(2, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut stats, KBASE, Instant::ZERO).unwrap();
        assert_eq!(cm.entry(cm.frame_index(paddr)).status(), crate::mm::coremap::FrameStatus::Kernel);
        assert_eq!(cm.used_count(), 2);
    }

    #[test]
    fn kpage_nalloc_returns_none_when_impossible() {
        let (mut cm, mut sw, mut ram, mut dev, mut tlb, _rng, mut stats) = machine(2, 0);
        // Fill both frames with kernel pages so no run, free or non-kernel, exists.
        kpage_nalloc(2, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut stats, KBASE, Instant::ZERO).unwrap();
        assert!(kpage_nalloc(1, &mut cm, &mut sw, &mut ram, &mut dev, &mut tlb, &mut stats, KBASE, Instant::ZERO).is_none());
    }
}
