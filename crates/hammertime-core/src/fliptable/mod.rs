//! Fliptables: per-attack sets of bit flips, their text and binary forms,
//! and the three-way diff between two tables.
mod attack;
mod binary;
mod diff;
mod lookup;
mod table;

pub use attack::{Attack, AttackDiff, Flip, FlipDirection, Targets};
pub use binary::{
    FLIP_RECORD_SIZE, FlipRecord, HAMMERING_SIZE, HEADER_SIZE, Hammering, LegacyTable, RANGE_SIZE,
    Range,
};
pub use diff::TableDiff;
pub use lookup::{ExtrapMode, LookupResult};
pub use table::{FlipTable, TableStats};
