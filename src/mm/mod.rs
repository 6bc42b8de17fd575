//! Demand-paged virtual memory: frame table, swap manager, software TLB,
//! paging engine, and the single owned "VM world" that bundles them.

pub mod coremap;
pub mod paging;
pub mod ram;
pub mod swap;
pub mod tlb;
pub mod vmworld;

pub use coremap::{CoreMap, FrameFlags, FrameStatus};
pub use paging::{FramePolicy, PagingError, PagingStats};
pub use ram::PhysicalRam;
pub use swap::{BlockDevice, InMemoryBlockDevice, SwapArea};
pub use tlb::{Tlb, TlbPolicy};
pub use vmworld::VmWorld;
