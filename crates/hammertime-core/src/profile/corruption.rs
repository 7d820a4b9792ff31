use std::fmt::{self, Display, Formatter};

use crate::fliptable::{Flip, FlipDirection};
use crate::memory::DRAMAddr;
use crate::util::set_bits;
use crate::{Error, Result};

/// A byte read back from a victim row that differs from the byte written.
///
/// `offset` is the byte offset relative to the victim address as logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Corruption {
    /// Byte offset relative to the victim address
    pub offset: u32,
    /// Byte observed after hammering
    pub got: u8,
    /// Byte written before hammering
    pub exp: u8,
}

impl Display for Corruption {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}|{:02x}|{:02x}", self.offset, self.got, self.exp)
    }
}

impl Corruption {
    /// Constructor for Corruption
    pub fn new(offset: u32, got: u8, exp: u8) -> Self {
        Corruption { offset, got, exp }
    }

    /// Bits that flipped from 0 to 1.
    pub fn pullup_mask(&self) -> u8 {
        !self.exp & self.got
    }

    /// Bits that flipped from 1 to 0.
    pub fn pulldown_mask(&self) -> u8 {
        self.exp & !self.got
    }

    /// Expands this corruption into single bit flips.
    ///
    /// The offset is split into a column (`offset / cell_size`) added to the
    /// victim's column and a byte within that cell (`offset % cell_size`).
    /// A `cell_size` of 0 is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the column leaves the 16 bit column space.
    pub fn flips(
        &self,
        victim: DRAMAddr,
        cell_size: u32,
    ) -> Result<impl Iterator<Item = Flip> + use<>> {
        let cell_size = cell_size.max(1);
        let addr = victim
            .checked_add_col(self.offset / cell_size)
            .ok_or_else(|| {
                Error::parse(format!(
                    "offset {:#x} from column {:#x} is past the last column",
                    self.offset, victim.col
                ))
            })?;
        let base = (self.offset % cell_size) * 8;
        let ups = set_bits(self.pullup_mask()).map(|b| (b, FlipDirection::ZeroToOne));
        let downs = set_bits(self.pulldown_mask()).map(|b| (b, FlipDirection::OneToZero));
        Ok(ups
            .chain(downs)
            .map(move |(b, dir)| Flip::new(addr, base + b as u32, dir)))
    }
}
