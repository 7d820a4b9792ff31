use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use serde::Serialize;

use crate::memory::DRAMAddr;
use crate::profile::{Corruption, HamRun};
use crate::util::set_bits;
use crate::{Error, Result};

/// Direction of a single bit flip.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlipDirection {
    /// Bit flipped from 0 to 1 (pullup)
    ZeroToOne,
    /// Bit flipped from 1 to 0 (pulldown)
    OneToZero,
}

impl Display for FlipDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FlipDirection::ZeroToOne => write!(f, "0 -> 1"),
            FlipDirection::OneToZero => write!(f, "1 -> 0"),
        }
    }
}

/// A single flipped bit in a victim row.
///
/// `addr` names the cell column, `bit` indexes the bit within that cell
/// (`cell_byte * 8 + bit_in_byte`). Flips are ordered by address, then bit,
/// then direction.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Flip {
    /// Cell containing the flipped bit
    pub addr: DRAMAddr,
    /// Bit index within the cell
    pub bit: u32,
    /// Transition direction
    pub direction: FlipDirection,
}

impl Flip {
    /// Constructor for Flip
    pub fn new(addr: DRAMAddr, bit: u32, direction: FlipDirection) -> Self {
        Flip {
            addr,
            bit,
            direction,
        }
    }

    /// Byte index of the flipped bit within its cell.
    pub fn cell_byte(&self) -> u32 {
        self.bit / 8
    }

    /// Bit index within the flipped byte (0..8).
    pub fn bit_in_byte(&self) -> u8 {
        (self.bit % 8) as u8
    }

    /// Returns true for 0 -> 1 flips.
    pub fn is_pullup(&self) -> bool {
        self.direction == FlipDirection::ZeroToOne
    }
}

/// Pullup and pulldown masks of one byte in one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ByteMasks {
    pub addr: DRAMAddr,
    pub cell_byte: u32,
    pub pullup: u8,
    pub pulldown: u8,
}

/// Collapses per-bit flips into per-byte masks.
///
/// `flips` must be sorted, as a `BTreeSet<Flip>` iterates.
pub(crate) fn byte_masks<'a>(flips: impl IntoIterator<Item = &'a Flip>) -> Vec<ByteMasks> {
    let mut out = vec![];
    for ((addr, cell_byte), group) in &flips
        .into_iter()
        .chunk_by(|f| (f.addr, f.cell_byte()))
    {
        let mut masks = ByteMasks {
            addr,
            cell_byte,
            pullup: 0,
            pulldown: 0,
        };
        for f in group {
            match f.direction {
                FlipDirection::ZeroToOne => masks.pullup |= 1 << f.bit_in_byte(),
                FlipDirection::OneToZero => masks.pulldown |= 1 << f.bit_in_byte(),
            }
        }
        out.push(masks);
    }
    out
}

/// Expands per-byte masks back into single bit flips.
pub(crate) fn mask_flips(
    addr: DRAMAddr,
    cell_byte: u32,
    pullup: u8,
    pulldown: u8,
) -> impl Iterator<Item = Flip> {
    let ups = set_bits(pullup).map(move |b| (b, FlipDirection::ZeroToOne));
    let downs = set_bits(pulldown).map(move |b| (b, FlipDirection::OneToZero));
    ups.chain(downs)
        .map(move |(b, dir)| Flip::new(addr, cell_byte * 8 + b as u32, dir))
}

/// The hammered rows of an attack.
///
/// Double-sided hammering stores both rows; single-sided hammering stores the
/// same row twice, which gives a row distance of 0. Targets order by the
/// first row's packed address, then the second's.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Targets {
    first: DRAMAddr,
    second: DRAMAddr,
}

impl Targets {
    /// Targets of a single-sided attack.
    pub fn single(target: DRAMAddr) -> Self {
        Targets {
            first: target,
            second: target,
        }
    }

    /// Targets of a double-sided attack.
    pub fn pair(first: DRAMAddr, second: DRAMAddr) -> Self {
        Targets { first, second }
    }

    /// Builds targets from a decoded list of target rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentTargets`] unless one or two rows are given.
    pub fn from_slice(targets: &[DRAMAddr]) -> Result<Self> {
        match targets {
            [t] => Ok(Targets::single(*t)),
            [a, b] => Ok(Targets::pair(*a, *b)),
            _ => Err(Error::InconsistentTargets(format!(
                "Unsupported hammering pattern with {} targets",
                targets.len()
            ))),
        }
    }

    /// First target row, in the order the targets were logged.
    pub fn first(&self) -> DRAMAddr {
        self.first
    }

    /// Second target row; equal to the first for single-sided attacks.
    pub fn second(&self) -> DRAMAddr {
        self.second
    }

    /// Returns true if only one row was hammered.
    pub fn is_single(&self) -> bool {
        self.first == self.second
    }

    /// Row distance between the two targets (0 for single-sided attacks).
    pub fn row_distance(&self) -> i32 {
        self.second.row_diff(&self.first)
    }
}

impl Display for Targets {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{} {}", self.first, self.second)
        }
    }
}

/// One hammering event and the deduplicated set of flips it produced.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Attack {
    targets: Targets,
    flips: BTreeSet<Flip>,
}

/// Three-way partition of two attacks on the same targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackDiff {
    /// Flips only present in the receiving attack
    pub self_only: Attack,
    /// Flips present in both attacks
    pub common: Attack,
    /// Flips only present in the argument attack
    pub other_only: Attack,
}

impl Attack {
    /// Creates an attack; duplicate flips collapse.
    pub fn new(targets: Targets, flips: impl IntoIterator<Item = Flip>) -> Self {
        Attack {
            targets,
            flips: flips.into_iter().collect(),
        }
    }

    /// Creates an attack without flips.
    pub fn empty(targets: Targets) -> Self {
        Attack {
            targets,
            flips: BTreeSet::new(),
        }
    }

    /// The hammered rows.
    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// The observed flips in ascending order.
    pub fn flips(&self) -> &BTreeSet<Flip> {
        &self.flips
    }

    /// Number of distinct flips.
    pub fn num_flips(&self) -> usize {
        self.flips.len()
    }

    /// Returns true if at least one flip was observed.
    pub fn has_flips(&self) -> bool {
        !self.flips.is_empty()
    }

    pub(crate) fn absorb(&mut self, flips: impl IntoIterator<Item = Flip>) {
        self.flips.extend(flips);
    }

    fn check_targets(&self, other: &Attack) -> Result<()> {
        if self.targets != other.targets {
            return Err(Error::MismatchedTargets {
                left: self.targets,
                right: other.targets,
            });
        }
        Ok(())
    }

    /// Unions the flips of two attacks on the same targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MismatchedTargets`] if the targets differ.
    pub fn merge(&self, other: &Attack) -> Result<Attack> {
        self.check_targets(other)?;
        Ok(Attack {
            targets: self.targets,
            flips: self.flips.union(&other.flips).copied().collect(),
        })
    }

    /// Partitions the flips of two attacks on the same targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MismatchedTargets`] if the targets differ.
    pub fn diff(&self, other: &Attack) -> Result<AttackDiff> {
        self.check_targets(other)?;
        Ok(self.split(other))
    }

    /// Set algebra behind [`Attack::diff`]; targets must already match.
    pub(crate) fn split(&self, other: &Attack) -> AttackDiff {
        let part = |flips: BTreeSet<Flip>| Attack {
            targets: self.targets,
            flips,
        };
        AttackDiff {
            self_only: part(self.flips.difference(&other.flips).copied().collect()),
            common: part(self.flips.intersection(&other.flips).copied().collect()),
            other_only: part(other.flips.difference(&self.flips).copied().collect()),
        }
    }
}

impl Attack {
    /// Encodes this attack as profile runs.
    ///
    /// The first run holds every flip observable against `baseline`, the
    /// second every flip observable against `!baseline`. The second run is
    /// omitted when empty; the first only when it is empty and the second
    /// is not, so an attack without flips still yields one run.
    pub fn to_hamruns(&self, baseline: u8) -> Vec<HamRun> {
        let targets = if self.targets.is_single() {
            vec![self.targets.first]
        } else {
            vec![self.targets.first, self.targets.second]
        };
        let mut primary = HamRun::new(targets.clone());
        let mut inverse = HamRun::new(targets);
        for m in byte_masks(&self.flips) {
            for (run, exp) in [(&mut primary, baseline), (&mut inverse, !baseline)] {
                let got = (exp | (m.pullup & !exp)) & !(m.pulldown & exp);
                if got != exp {
                    run.push(m.addr, Corruption::new(m.cell_byte, got, exp));
                }
            }
        }
        match (primary.is_empty(), inverse.is_empty()) {
            (_, true) => vec![primary],
            (true, false) => vec![inverse],
            (false, false) => vec![primary, inverse],
        }
    }

    /// Renders the attack for humans, one flip per line.
    pub fn pretty(&self) -> String {
        let t = self.targets.first;
        let rows = if self.targets.is_single() {
            format!("row {}", t.row)
        } else {
            format!("rows {}, {}", t.row, self.targets.second.row)
        };
        let mut out = format!(
            "Hammering {} on bank {}, rank {}, DIMM {}, channel {}",
            rows, t.bank, t.rank, t.dimm, t.chan
        );
        for f in &self.flips {
            out += &format!(
                "\n\tBit flip on row {:6}, column {:4}, bit {:2}: {}",
                f.addr.row, f.addr.col, f.bit, f.direction
            );
        }
        out
    }
}
