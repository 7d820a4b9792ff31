use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// DRAM address with channel, DIMM, rank, bank, row, and column components.
///
/// Identifies one cell column in the DRAM hierarchy. Ordering and hashing
/// are defined on [`DRAMAddr::numeric_value`], which packs all six fields
/// into a single integer with the column in the lowest bits and the channel
/// in the highest, so equality, sorting and set membership agree.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DRAMAddr {
    /// Channel number
    pub chan: u8,
    /// DIMM number
    pub dimm: u8,
    /// Rank number
    pub rank: u8,
    /// Bank number
    pub bank: u8,
    /// Row number
    pub row: u16,
    /// Column number
    pub col: u16,
}

impl Display for DRAMAddr {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(
            fmt,
            "({:x} {:x} {:x} {:x} {:4x} {:3x})",
            self.chan, self.dimm, self.rank, self.bank, self.row, self.col
        )
    }
}

impl DRAMAddr {
    /// Creates a new DRAM address.
    pub fn new(chan: u8, dimm: u8, rank: u8, bank: u8, row: u16, col: u16) -> Self {
        DRAMAddr {
            chan,
            dimm,
            rank,
            bank,
            row,
            col,
        }
    }

    /// Packs all components into one integer.
    ///
    /// Layout (LSB first): column 16 bits, row 16 bits, then bank, rank,
    /// DIMM and channel with 8 bits each.
    pub const fn numeric_value(&self) -> u64 {
        (self.col as u64)
            | (self.row as u64) << 16
            | (self.bank as u64) << 32
            | (self.rank as u64) << 40
            | (self.dimm as u64) << 48
            | (self.chan as u64) << 56
    }

    /// Returns true if both addresses lie in the same bank, ignoring row and column.
    pub fn same_bank(&self, other: &DRAMAddr) -> bool {
        self.chan == other.chan
            && self.dimm == other.dimm
            && self.rank == other.rank
            && self.bank == other.bank
    }

    /// Signed row distance `self.row - other.row`.
    pub fn row_diff(&self, other: &DRAMAddr) -> i32 {
        self.row as i32 - other.row as i32
    }
}

impl DRAMAddr {
    /// Moves the address by `rows` rows, wrapping around the 16 bit row space.
    pub fn add_row(&self, rows: i32) -> DRAMAddr {
        DRAMAddr {
            row: (self.row as i32).wrapping_add(rows) as u16,
            ..*self
        }
    }

    /// Moves the address by `rows` rows, or `None` if the row leaves `0..=u16::MAX`.
    pub fn checked_add_row(&self, rows: i32) -> Option<DRAMAddr> {
        let row = u16::try_from(self.row as i32 + rows).ok()?;
        Some(DRAMAddr { row, ..*self })
    }

    /// Moves the address by `cols` columns, wrapping around the 16 bit column space.
    pub fn add_col(&self, cols: u16) -> DRAMAddr {
        DRAMAddr {
            col: self.col.wrapping_add(cols),
            ..*self
        }
    }

    /// Moves the address by `cols` columns, or `None` past the last column.
    pub fn checked_add_col(&self, cols: u32) -> Option<DRAMAddr> {
        let col = u16::try_from(self.col as u32 + cols.min(u16::MAX as u32 + 1)).ok()?;
        Some(DRAMAddr { col, ..*self })
    }
}

impl Ord for DRAMAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric_value().cmp(&other.numeric_value())
    }
}

impl PartialOrd for DRAMAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for DRAMAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numeric_value().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::DRAMAddr;
    use std::collections::HashSet;

    #[test]
    fn numeric_value_layout() {
        let a = DRAMAddr::new(1, 2, 3, 4, 0x5566, 0x7788);
        assert_eq!(a.numeric_value(), 0x0102_0304_5566_7788);
        assert_eq!(DRAMAddr::default().numeric_value(), 0);
    }

    #[test]
    fn order_follows_packed_value() {
        let low_chan_high_row = DRAMAddr::new(0, 0, 0, 0, 0xffff, 0xffff);
        let high_chan = DRAMAddr::new(1, 0, 0, 0, 0, 0);
        assert!(low_chan_high_row < high_chan);

        let mut addrs = vec![
            DRAMAddr::new(0, 0, 0, 1, 0, 0),
            DRAMAddr::new(0, 0, 0, 0, 2, 0),
            DRAMAddr::new(0, 0, 0, 0, 1, 5),
            DRAMAddr::new(0, 0, 1, 0, 0, 0),
        ];
        addrs.sort();
        let rows: Vec<_> = addrs.iter().map(|a| (a.rank, a.bank, a.row)).collect();
        assert_eq!(rows, vec![(0, 0, 1), (0, 0, 2), (0, 1, 0), (1, 0, 0)]);
    }

    #[test]
    fn hash_agrees_with_eq() {
        let set: HashSet<_> = [
            DRAMAddr::new(0, 0, 0, 0, 100, 0),
            DRAMAddr::new(0, 0, 0, 0, 100, 0),
            DRAMAddr::new(0, 0, 0, 0, 101, 0),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn same_bank_ignores_row_and_col() {
        let a = DRAMAddr::new(0, 1, 0, 3, 10, 2);
        assert!(a.same_bank(&DRAMAddr::new(0, 1, 0, 3, 999, 40)));
        assert!(!a.same_bank(&DRAMAddr::new(0, 1, 0, 4, 10, 2)));
    }

    #[test]
    fn row_arithmetic() {
        let a = DRAMAddr::new(0, 0, 0, 0, 100, 7);
        assert_eq!(a.add_row(2).row, 102);
        assert_eq!(a.add_row(-100).row, 0);
        assert_eq!(a.add_row(2).row_diff(&a), 2);
        assert_eq!(a.checked_add_row(-101), None);
        assert_eq!(a.add_col(1).col, 8);
        assert_eq!(a.checked_add_col(1).map(|b| b.col), Some(8));
        assert_eq!(a.checked_add_col(u32::MAX), None);
    }

    #[test]
    fn display_is_hex() {
        let a = DRAMAddr::new(0, 1, 0, 0xa, 0x64, 0x3);
        assert_eq!(a.to_string(), "(0 1 0 a   64   3)");
    }
}
