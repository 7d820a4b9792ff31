use log::trace;
use serde::{Deserialize, Serialize};

use crate::fliptable::{Flip, FlipRecord, LegacyTable, Range};
use crate::memory::DRAMAddr;

/// How to answer a lookup for targets that were never hammered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapMode {
    /// Only exact hits return flips
    #[default]
    None,
    /// Alias the row into a profiled range of the same bank, modulo its length
    PerBank,
    /// Like `PerBank`, modulo the largest power of two not above the range length
    PerBankTrunc,
    /// Fit the range into a power-of-two aligned window and alias within it
    PerBankFit,
}

/// Flips found for a lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupResult<'a> {
    /// Flip records of the hammering used to answer
    pub flips: &'a [FlipRecord],
    /// Rows between the requested address and the hammering used; 0 on an exact hit
    pub row_offset: i32,
}

impl LookupResult<'_> {
    /// True if the answer came from another row.
    pub fn is_extrapolated(&self) -> bool {
        self.row_offset != 0
    }

    /// Bit flips moved by `row_offset`, as predicted for the requested row.
    pub fn shifted_flips(&self) -> impl Iterator<Item = Flip> + '_ {
        let offset = self.row_offset;
        self.flips.iter().flat_map(FlipRecord::flips).map(move |mut f| {
            f.addr = f.addr.add_row(offset);
            f
        })
    }
}

/// Orders addresses by row, ignoring the column.
fn row_key(addr: &DRAMAddr) -> u64 {
    addr.numeric_value() >> 16
}

/// Smallest power of two strictly greater than `x`.
fn bitsize(x: u32) -> u32 {
    let mut ret = 1u32;
    while ret <= x {
        ret <<= 1;
    }
    ret
}

impl LegacyTable {
    /// Looks up the flips caused by hammering `addr` (the first target row).
    ///
    /// Ranges are binary searched; a range holding the row answers exactly.
    /// Otherwise `mode` decides whether a neighbouring range of the same bank
    /// stands in for it.
    pub fn lookup(&self, addr: DRAMAddr, mode: ExtrapMode) -> Option<LookupResult<'_>> {
        let ranges = self.ranges();
        let idx = ranges.partition_point(|r| row_key(&r.start) <= row_key(&addr));
        let before = idx.checked_sub(1).and_then(|i| ranges.get(i));
        let after = ranges.get(idx);

        if let Some(r) = before
            && r.start.same_bank(&addr)
        {
            let d = addr.row_diff(&r.start);
            if d >= 0 && (d as u32) < r.num_hammers {
                trace!("exact hit for {} in range at {}", addr, r.start);
                return Some(self.result(r, d as u32, 0));
            }
        }
        if mode == ExtrapMode::None {
            return None;
        }
        [before, after]
            .into_iter()
            .flatten()
            .find(|r| r.start.same_bank(&addr))
            .and_then(|r| self.extrapolate(addr, r, mode))
    }

    fn result(&self, r: &Range, d: u32, row_offset: i32) -> LookupResult<'_> {
        let h = &self.hammers()[(r.ham_idx + d) as usize];
        LookupResult {
            flips: self.hammering_flips(h),
            row_offset,
        }
    }

    fn extrapolate(&self, addr: DRAMAddr, r: &Range, mode: ExtrapMode) -> Option<LookupResult<'_>> {
        let n = r.num_hammers;
        let rsz = match mode {
            ExtrapMode::None => return None,
            ExtrapMode::PerBank => n,
            ExtrapMode::PerBankTrunc => bitsize(n) >> 1,
            ExtrapMode::PerBankFit => {
                let rsz = bitsize(n);
                if 4 * n < 3 * rsz { rsz >> 1 } else { rsz }
            }
        };
        if rsz == 0 {
            return None;
        }
        let d = if mode == ExtrapMode::PerBankFit {
            let mask = rsz - 1;
            let adj = r.start.row as u32 & mask;
            let mut vstart = r.start;
            vstart.row &= !(mask as u16);
            let d = addr.row_diff(&vstart).rem_euclid(rsz as i32) as u32;
            if d < adj || d >= adj + n {
                trace!("{} falls outside fitted window of range at {}", addr, r.start);
                return None;
            }
            d - adj
        } else {
            addr.row_diff(&r.start).rem_euclid(rsz as i32) as u32
        };
        let used = r.start.add_row(d as i32);
        trace!("extrapolating {} from {}", addr, used);
        Some(self.result(r, d, addr.row_diff(&used)))
    }
}
