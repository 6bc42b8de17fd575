//! Swap manager: a fixed-size array of disk chunks backing evicted pages,
//! plus the inverse map and free bitmap that mirror the coremap's.
//!
//! The backing store itself — a raw block device opened once at boot — is
//! treated as an external collaborator (this spec scopes out the device
//! layer), so swap-in/swap-out read and write through a small
//! [`BlockDevice`] trait rather than a concrete driver.

#![allow(dead_code)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use crate::config::PAGE_SIZE;

/// A page-granularity block device: the backing store for swapped pages.
///
/// Out of scope for this crate's core is *which* device this is (disk,
/// ramdisk, network block store); in-scope is only that it can read and
/// write whole pages by chunk index.
pub trait BlockDevice {
    /// Total number of page-sized chunks this device exposes.
    fn chunk_count(&self) -> usize;
    /// Read chunk `chunk` into `buf` (`buf.len() == PAGE_SIZE`).
    fn read_chunk(&self, chunk: usize, buf: &mut [u8]);
    /// Write `buf` (`buf.len() == PAGE_SIZE`) to chunk `chunk`.
    fn write_chunk(&mut self, chunk: usize, buf: &[u8]);
}

/// An in-memory stand-in for the raw block device, used both by tests and
/// as this crate's only concrete `BlockDevice` — the real disk driver lives
/// in the device layer this spec deliberately scopes out.
pub struct InMemoryBlockDevice {
    chunks: Vec<[u8; PAGE_SIZE]>,
}

impl InMemoryBlockDevice {
    pub fn new(num_chunks: usize) -> Self {
        Self {
            chunks: vec![[0u8; PAGE_SIZE]; num_chunks],
        }
    }
}

impl BlockDevice for InMemoryBlockDevice {
    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn read_chunk(&self, chunk: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.chunks[chunk]);
    }

    fn write_chunk(&mut self, chunk: usize, buf: &[u8]) {
        self.chunks[chunk].copy_from_slice(buf);
    }
}

/// One entry in the swap area: which page-sized chunk holds which
/// `(vaddr, pid)`, or nothing if the chunk is free.
#[derive(Debug, Clone, Copy, Default)]
struct SwapEntry {
    vaddr: usize,
    pid: u32,
}

impl SwapEntry {
    const fn empty() -> Self {
        Self { vaddr: 0, pid: 0 }
    }

    fn is_free(&self) -> bool {
        self.pid == 0
    }
}

/// The swap area: the `swaparea[]` inverse map plus its free bitmap.
pub struct SwapArea {
    entries: Vec<SwapEntry>,
    bitmap: Vec<bool>,
}

impl SwapArea {
    pub fn init(num_chunks: usize) -> Self {
        Self {
            entries: vec![SwapEntry::empty(); num_chunks],
            bitmap: vec![false; num_chunks],
        }
    }

    pub fn num_chunks(&self) -> usize {
        self.entries.len()
    }

    pub fn used_count(&self) -> usize {
        self.bitmap.iter().filter(|b| **b).count()
    }

    /// `add_spage`: register `chunk` as holding `(vaddr, pid)`. `pid` must
    /// be non-zero — a chunk is always owned by some user process.
    ///
    /// # Panics
    /// Panics if `pid == 0`, matching the spec's "pid must be non-zero on
    /// add" invariant.
    pub fn add_spage(&mut self, vaddr: usize, chunk: usize, pid: u32) {
        assert_ne!(pid, 0, "swap entries must have a non-zero owning pid");
        self.entries[chunk] = SwapEntry { vaddr, pid };
        self.bitmap[chunk] = true;
    }

    /// `remove_spage`: free a chunk.
    pub fn remove_spage(&mut self, chunk: usize) {
        self.entries[chunk] = SwapEntry::empty();
        self.bitmap[chunk] = false;
    }

    /// `get_spage`: locate the chunk holding `(vaddr, pid)`.
    ///
    /// # Panics
    /// The spec treats a miss here as fatal: the page must be either
    /// resident (found via the coremap first) or swapped out, never
    /// neither.
    pub fn get_spage(&self, vaddr: usize, pid: u32) -> usize {
        self.entries
            .iter()
            .position(|e| !e.is_free() && e.vaddr == vaddr && e.pid == pid)
            .expect("swap lookup miss: page is neither resident nor swapped")
    }

    /// `get_empty_chunk`: allocate a free chunk, or `None` if swap is full
    /// (the caller's policy on exhaustion — killing the current process —
    /// lives above this layer).
    pub fn get_empty_chunk(&self) -> Option<usize> {
        self.bitmap.iter().position(|used| !used)
    }

    pub fn check_bijection(&self) -> bool {
        let mut seen: Vec<(usize, u32)> = Vec::new();
        for (i, e) in self.entries.iter().enumerate() {
            if self.bitmap[i] == e.is_free() {
                return false;
            }
            if !e.is_free() {
                let key = (e.vaddr, e.pid);
                if seen.contains(&key) {
                    return false;
                }
                seen.push(key);
            }
        }
        true
    }

    /// Swap a page out to `chunk`, writing it through `device`.
    pub fn swapout(&mut self, device: &mut impl BlockDevice, chunk: usize, page: &[u8], vaddr: usize, pid: u32) {
        self.add_spage(vaddr, chunk, pid);
        device.write_chunk(chunk, page);
    }

    /// Swap a page in from `chunk`, reading it through `device`. Frees the
    /// chunk on completion — a page is never reachable from both the
    /// coremap and the swap area at once.
    pub fn swapin(&mut self, device: &impl BlockDevice, chunk: usize, page: &mut [u8]) {
        device.read_chunk(chunk, page);
        self.remove_spage(chunk);
    }
}
