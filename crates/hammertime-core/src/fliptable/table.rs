use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;

use crate::fliptable::diff::diff_tables;
use crate::fliptable::{Attack, TableDiff, Targets};
use crate::profile::AttackReader;
use crate::{FliptableConfig, Result};

/// An ordered collection of attacks.
///
/// Attacks are kept sorted ascending by their targets and no two attacks
/// share the same targets; [`FlipTable::new`] establishes this by sorting and
/// merging. Equality compares the attack sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlipTable {
    attacks: Vec<Attack>,
}

/// Summary counts of a fliptable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Number of attacks
    pub hammers: usize,
    /// Number of attacks with at least one flip
    pub with_flips: usize,
    /// Total number of flips over all attacks
    pub total_flips: usize,
}

impl FlipTable {
    /// Builds a table from attacks in any order.
    ///
    /// Attacks on the same targets are merged, so re-observed flips count once.
    pub fn new(attacks: impl IntoIterator<Item = Attack>) -> Self {
        let attacks = attacks
            .into_iter()
            .sorted_by_key(|a| *a.targets())
            .coalesce(|a, b| {
                if a.targets() == b.targets() {
                    let mut a = a;
                    a.absorb(b.flips().iter().copied());
                    Ok(a)
                } else {
                    Err((a, b))
                }
            })
            .collect();
        FlipTable { attacks }
    }

    /// Wraps attacks that are already sorted by unique targets.
    pub(crate) fn from_sorted(attacks: Vec<Attack>) -> Self {
        debug_assert!(attacks.windows(2).all(|w| w[0].targets() < w[1].targets()));
        FlipTable { attacks }
    }

    /// Decodes a profile log or text fliptable from any buffered reader.
    ///
    /// # Errors
    ///
    /// Returns the first parse, target or I/O error; no partial table is produced.
    pub fn read_from<R: BufRead>(reader: R, config: &FliptableConfig) -> Result<Self> {
        let attacks = AttackReader::new(reader, config).collect::<Result<Vec<_>>>()?;
        Ok(FlipTable::new(attacks))
    }

    /// Loads a profile log or text fliptable with default parameters.
    ///
    /// # Errors
    ///
    /// See [`FlipTable::read_from`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        FlipTable::load_with_config(path, &FliptableConfig::default())
    }

    /// Loads a profile log or text fliptable.
    ///
    /// # Errors
    ///
    /// See [`FlipTable::read_from`].
    pub fn load_with_config(path: impl AsRef<Path>, config: &FliptableConfig) -> Result<Self> {
        let path = path.as_ref();
        let table = FlipTable::read_from(BufReader::new(File::open(path)?), config)?;
        let stats = table.stats();
        info!(
            "Loaded {}: {} hammers, {} flips",
            path.display(),
            stats.hammers,
            stats.total_flips
        );
        if table.is_empty() {
            warn!("{} contains no attacks", path.display());
        }
        Ok(table)
    }

    /// Writes the text form: one or two profile lines per attack.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, config: &FliptableConfig) -> Result<()> {
        for attack in &self.attacks {
            for run in attack.to_hamruns(config.baseline) {
                writeln!(writer, "{}", run)?;
            }
        }
        Ok(())
    }

    /// Saves the text form with default parameters.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with_config(path, &FliptableConfig::default())
    }

    /// Saves the text form.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save_with_config(&self, path: impl AsRef<Path>, config: &FliptableConfig) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut writer, config)?;
        writer.flush()?;
        Ok(())
    }
}

impl FlipTable {
    /// Iterates over attacks in ascending target order.
    pub fn iter(&self) -> std::slice::Iter<'_, Attack> {
        self.attacks.iter()
    }

    /// The attacks in ascending target order.
    pub fn attacks(&self) -> &[Attack] {
        &self.attacks
    }

    /// Number of attacks.
    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    /// Returns true if the table holds no attacks.
    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    /// Finds the attack on `targets`.
    pub fn get(&self, targets: &Targets) -> Option<&Attack> {
        self.attacks
            .binary_search_by(|a| a.targets().cmp(targets))
            .ok()
            .map(|i| &self.attacks[i])
    }

    /// Total number of flips over all attacks.
    pub fn num_flips(&self) -> usize {
        self.attacks.iter().map(Attack::num_flips).sum()
    }

    /// Summary counts.
    pub fn stats(&self) -> TableStats {
        TableStats {
            hammers: self.len(),
            with_flips: self.attacks.iter().filter(|a| a.has_flips()).count(),
            total_flips: self.num_flips(),
        }
    }

    /// Three-way diff against `other`.
    pub fn diff(&self, other: &FlipTable) -> TableDiff {
        diff_tables(self, other)
    }

    /// Flips present in every table: the `common` part of successive diffs.
    ///
    /// Returns an empty table if `tables` is empty.
    pub fn common_flips(tables: impl IntoIterator<Item = FlipTable>) -> FlipTable {
        tables
            .into_iter()
            .reduce(|acc, t| acc.diff(&t).common)
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a FlipTable {
    type Item = &'a Attack;
    type IntoIter = std::slice::Iter<'a, Attack>;

    fn into_iter(self) -> Self::IntoIter {
        self.attacks.iter()
    }
}

impl IntoIterator for FlipTable {
    type Item = Attack;
    type IntoIter = std::vec::IntoIter<Attack>;

    fn into_iter(self) -> Self::IntoIter {
        self.attacks.into_iter()
    }
}

impl FromIterator<Attack> for FlipTable {
    fn from_iter<T: IntoIterator<Item = Attack>>(iter: T) -> Self {
        FlipTable::new(iter)
    }
}
