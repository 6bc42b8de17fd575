//! Software-managed TLB controller.
//!
//! Models a small hardware-associative cache the kernel maintains entirely
//! in software: insert, invalidate-one, and invalidate-all, plus a choice
//! of replacement policy when every slot is full. All mutations are meant
//! to run under [`crate::spl::splhigh`] — the methods here don't take the
//! guard themselves (the caller holds it, the way a real TLB-write routine
//! would already be running with interrupts off), but each demands
//! `&mut self`, so a caller can't mutate two ways at once.

#![allow(dead_code)]

use crate::clock::Instant;
use crate::rng::Xorshift64;

/// A single TLB slot: a faulting virtual address mapped to a physical
/// frame, or empty.
#[derive(Debug, Clone, Copy, Default)]
struct TlbSlot {
    valid: bool,
    vaddr: usize,
    paddr: usize,
    dirty: bool,
}

/// TLB eviction policy, chosen once at machine configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbPolicy {
    /// Hardware random-index replacement.
    Random,
    /// Not-recently-used: evict the slot with the oldest observed access.
    Nru,
}

/// The software TLB shadow state: `NUM_TLB` slots plus, for NRU, an
/// age timestamp per slot.
pub struct Tlb {
    slots: alloc::vec::Vec<TlbSlot>,
    age: alloc::vec::Vec<u64>,
    policy: TlbPolicy,
}

extern crate alloc;

impl Tlb {
    pub fn new(num_slots: usize, policy: TlbPolicy) -> Self {
        Self {
            slots: alloc::vec![TlbSlot::default(); num_slots],
            age: alloc::vec![0u64; num_slots],
            policy,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn policy(&self) -> TlbPolicy {
        self.policy
    }

    fn ticks(now: Instant) -> u64 {
        now.sec.wrapping_mul(1_000_000_000).wrapping_add(now.nsec)
    }

    /// `TLB_Insert`: install `(faultaddr, paddr|DIRTY|VALID)`.
    ///
    /// Prefers any slot with its VALID bit clear. If every slot is full,
    /// falls back to the configured replacement policy. `now` feeds the
    /// NRU age clock; callers outside tests pass the logical clock's
    /// current reading.
    pub fn insert(&mut self, faultaddr: usize, paddr: usize, rng: &mut Xorshift64, now: Instant) {
        if let Some(i) = self.slots.iter().position(|s| !s.valid) {
            self.write_slot(i, faultaddr, paddr, now);
            return;
        }

        let victim = match self.policy {
            TlbPolicy::Random => rng.next_below(self.slots.len()),
            TlbPolicy::Nru => {
                // Age the slot that already maps this address, if any,
                // then evict the least-recently-touched slot.
                if let Some(i) = self.slots.iter().position(|s| s.valid && s.vaddr == faultaddr) {
                    self.age[i] = Self::ticks(now);
                }
                (0..self.slots.len())
                    .min_by_key(|&i| self.age[i])
                    .expect("TLB has at least one slot")
            }
        };
        self.write_slot(victim, faultaddr, paddr, now);
    }

    fn write_slot(&mut self, i: usize, vaddr: usize, paddr: usize, now: Instant) {
        self.slots[i] = TlbSlot {
            valid: true,
            vaddr,
            paddr,
            dirty: true,
        };
        self.age[i] = Self::ticks(now);
    }

    /// `TLB_Invalidate_all`: every slot becomes invalid; NRU ages reset.
    pub fn invalidate_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = TlbSlot::default();
        }
        for a in self.age.iter_mut() {
            *a = 0;
        }
    }

    /// `TLB_Invalidate`: drop any slot whose physical frame equals `paddr`
    /// (both masked to their containing page).
    pub fn invalidate(&mut self, paddr: usize) {
        let target = paddr & crate::config::PAGE_FRAME_MASK;
        for slot in self.slots.iter_mut() {
            if slot.valid && (slot.paddr & crate::config::PAGE_FRAME_MASK) == target {
                *slot = TlbSlot::default();
            }
        }
    }

    /// Look up a faulting address's mapping, if cached. Exposed for tests;
    /// hardware would normally intercept a hit before it ever reaches this
    /// crate's fault handler.
    pub fn lookup(&self, vaddr: usize) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.valid && s.vaddr == vaddr)
            .map(|s| s.paddr)
    }

    /// Count of currently-valid slots.
    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|s| s.valid).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut tlb = Tlb::new(4, TlbPolicy::Random);
        let mut rng = Xorshift64::new(1);
        tlb.insert(0x1000, 0x9000, &mut rng, Instant::ZERO);
        assert_eq!(tlb.lookup(0x1000), Some(0x9000));
    }

    #[test]
    fn invalidate_all_clears_every_slot() {
        let mut tlb = Tlb::new(4, TlbPolicy::Nru);
        let mut rng = Xorshift64::new(1);
        for i in 0..4 {
            tlb.insert(0x1000 * i, 0x2000 * i, &mut rng, Instant::ZERO);
        }
        assert_eq!(tlb.valid_count(), 4);
        tlb.invalidate_all();
        assert_eq!(tlb.valid_count(), 0);
    }

    #[test]
    fn invalidate_drops_only_matching_frame() {
        let mut tlb = Tlb::new(2, TlbPolicy::Random);
        let mut rng = Xorshift64::new(1);
        tlb.insert(0x1000, 0x9000, &mut rng, Instant::ZERO);
        tlb.insert(0x2000, 0xA000, &mut rng, Instant::ZERO);
        tlb.invalidate(0x9000);
        assert_eq!(tlb.lookup(0x1000), None);
        assert_eq!(tlb.lookup(0x2000), Some(0xA000));
    }

    #[test]
    fn nru_evicts_oldest_slot_when_full() {
        let mut tlb = Tlb::new(2, TlbPolicy::Nru);
        let mut rng = Xorshift64::new(1);
        tlb.insert(0x1000, 0x9000, &mut rng, Instant::new(1, 0));
        tlb.insert(0x2000, 0xA000, &mut rng, Instant::new(2, 0));
        // Both slots full; slot 0 (0x1000) is older and should be evicted.
        tlb.insert(0x3000, 0xB000, &mut rng, Instant::new(3, 0));
        assert_eq!(tlb.lookup(0x1000), None);
        assert_eq!(tlb.lookup(0x2000), Some(0xA000));
        assert_eq!(tlb.lookup(0x3000), Some(0xB000));
    }

    #[test]
    fn fills_free_slots_before_evicting() {
        let mut tlb = Tlb::new(3, TlbPolicy::Random);
        let mut rng = Xorshift64::new(7);
        tlb.insert(0x1000, 0x9000, &mut rng, Instant::ZERO);
        tlb.insert(0x2000, 0xA000, &mut rng, Instant::ZERO);
        assert_eq!(tlb.valid_count(), 2);
        tlb.insert(0x3000, 0xB000, &mut rng, Instant::ZERO);
        assert_eq!(tlb.valid_count(), 3);
    }
}
