use std::fmt::{Debug, Formatter};

use itertools::Itertools;
use serde::Serialize;

use crate::fliptable::{Attack, FlipDirection};
use crate::memory::DRAMAddr;

#[repr(transparent)]
#[derive(Clone, Copy, Default, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Physical memory address.
///
/// A newtype wrapper around a physical address value.
pub struct PhysAddr(u64);

impl Debug for PhysAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("PhysAddr(0x{:02x})", self.0))
    }
}

impl PhysAddr {
    /// Creates a new physical address.
    pub fn new(addr: u64) -> Self {
        PhysAddr(addr)
    }

    /// Returns the address as a u64.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the page frame number for the given page shift.
    pub fn pfn(&self, page_shift: u32) -> u64 {
        self.0 >> page_shift
    }
}

/// Translates between physical addresses and DRAM coordinates.
///
/// The mapping itself (routing, controller and DIMM remapping) lives outside
/// this crate; consumers that need physical addresses plug in their own
/// memory system description.
pub trait AddrResolver {
    /// Maps a physical address onto its DRAM coordinates.
    fn resolve(&self, phys: PhysAddr) -> DRAMAddr;

    /// Maps DRAM coordinates back onto the physical address of the cell.
    fn resolve_reverse(&self, addr: DRAMAddr) -> PhysAddr;
}

/// A single bit flip located in physical memory.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysFlip {
    /// Physical address of the byte holding the flipped bit
    pub addr: PhysAddr,
    /// Bit index within that byte (0..8)
    pub bit: u8,
    /// Transition direction
    pub direction: FlipDirection,
}

impl Attack {
    /// Places every flip of this attack in physical memory.
    ///
    /// The result is sorted by physical address, then bit.
    pub fn to_physmem(&self, resolver: &dyn AddrResolver) -> Vec<PhysFlip> {
        self.flips()
            .iter()
            .map(|f| {
                let cell = resolver.resolve_reverse(f.addr).as_u64();
                PhysFlip {
                    addr: PhysAddr::new(cell + f.cell_byte() as u64),
                    bit: f.bit_in_byte(),
                    direction: f.direction,
                }
            })
            .sorted()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AddrResolver, PhysAddr};
    use crate::fliptable::{Attack, Flip, FlipDirection, Targets};
    use crate::memory::DRAMAddr;

    /// Row-major toy mapping: 8 byte cells, 1024 columns per row, one bank.
    struct Linear;

    impl AddrResolver for Linear {
        fn resolve(&self, phys: PhysAddr) -> DRAMAddr {
            let cell = phys.as_u64() / 8;
            DRAMAddr::new(0, 0, 0, 0, (cell / 1024) as u16, (cell % 1024) as u16)
        }

        fn resolve_reverse(&self, addr: DRAMAddr) -> PhysAddr {
            PhysAddr::new((addr.row as u64 * 1024 + addr.col as u64) * 8)
        }
    }

    #[test]
    fn resolver_round_trip() {
        let a = DRAMAddr::new(0, 0, 0, 0, 3, 17);
        assert_eq!(Linear.resolve(Linear.resolve_reverse(a)), a);
    }

    #[test]
    fn to_physmem_sorts_by_address() {
        let target = DRAMAddr::new(0, 0, 0, 0, 4, 0);
        let late = DRAMAddr::new(0, 0, 0, 0, 5, 2);
        let early = DRAMAddr::new(0, 0, 0, 0, 3, 0);
        let attack = Attack::new(
            Targets::single(target),
            [
                Flip::new(late, 9, FlipDirection::ZeroToOne),
                Flip::new(early, 0, FlipDirection::OneToZero),
            ],
        );
        let phys = attack.to_physmem(&Linear);
        assert_eq!(phys.len(), 2);
        assert_eq!(phys[0].addr, PhysAddr::new(3 * 1024 * 8));
        assert_eq!(phys[0].direction, FlipDirection::OneToZero);
        assert_eq!(phys[1].addr, PhysAddr::new((5 * 1024 + 2) * 8 + 1));
        assert_eq!(phys[1].bit, 1);
        assert_eq!(phys[1].addr.pfn(12), ((5 * 1024 + 2) * 8 + 1) >> 12);
    }
}
