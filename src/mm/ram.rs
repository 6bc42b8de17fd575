//! Backing byte storage for the frames the coremap describes.
//!
//! The coremap (`coremap.rs`) is purely an inverse page table: addresses,
//! owners, flags, timestamps. On real hardware the bytes live at the
//! physical address itself; here, since this crate models physical memory
//! rather than touching it, the bytes live in a flat array indexed the same
//! way the coremap indexes its entries (`CoreMap::frame_index`). Swap-out
//! reads from here, swap-in writes back into it, and `as_copy`'s
//! page-for-page fork duplication copies one frame's worth at a time.

#![allow(dead_code)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use crate::config::PAGE_SIZE;

/// One page-sized byte array per managed physical frame.
pub struct PhysicalRam {
    frames: Vec<[u8; PAGE_SIZE]>,
}

impl PhysicalRam {
    /// Allocate `num_frames` zeroed pages.
    pub fn init(num_frames: usize) -> Self {
        Self {
            frames: vec![[0u8; PAGE_SIZE]; num_frames],
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn read(&self, frame_index: usize) -> &[u8; PAGE_SIZE] {
        &self.frames[frame_index]
    }

    pub fn write(&mut self, frame_index: usize, bytes: &[u8]) {
        self.frames[frame_index].copy_from_slice(bytes);
    }

    /// Zero an entire frame. Used when `as_prepare_load` hands out a fresh
    /// page: the source this spec is drawn from documented zeroing as
    /// intended behavior without actually doing it, so this crate does.
    pub fn zero(&mut self, frame_index: usize) {
        self.frames[frame_index] = [0u8; PAGE_SIZE];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut ram = PhysicalRam::init(4);
        let page = [0x42u8; PAGE_SIZE];
        ram.write(2, &page);
        assert_eq!(ram.read(2), &page);
    }

    #[test]
    fn zero_clears_a_frame() {
        let mut ram = PhysicalRam::init(2);
        ram.write(0, &[0xFFu8; PAGE_SIZE]);
        ram.zero(0);
        assert_eq!(ram.read(0), &[0u8; PAGE_SIZE]);
    }

    #[test]
    fn frames_start_zeroed() {
        let ram = PhysicalRam::init(3);
        for i in 0..3 {
            assert_eq!(ram.read(i), &[0u8; PAGE_SIZE]);
        }
    }
}
