//! The `memory` module provides the DRAM coordinate model.
//!
//! - `DRAMAddr`: A six-field DRAM cell address with a packed total order.
//! - `AddrResolver`: A trait for mapping between physical addresses and `DRAMAddr`.
//! - `PhysAddr`, `PhysFlip`: Physical-memory view of bit flips.
mod addr_resolver;
mod dram_addr;

pub use self::addr_resolver::{AddrResolver, PhysAddr, PhysFlip};
pub use self::dram_addr::DRAMAddr;
