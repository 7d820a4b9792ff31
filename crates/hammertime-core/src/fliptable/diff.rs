use std::cmp::Ordering;

use log::debug;
use serde::Serialize;

use crate::fliptable::{Attack, FlipTable};

/// Result of [`FlipTable::diff`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableDiff {
    /// Flips only seen in the receiving table
    pub self_only: FlipTable,
    /// Flips seen in both tables
    pub common: FlipTable,
    /// Flips only seen in the argument table
    pub other_only: FlipTable,
}

impl TableDiff {
    /// Splits into `(self_only, common, other_only)`.
    pub fn into_tuple(self) -> (FlipTable, FlipTable, FlipTable) {
        (self.self_only, self.common, self.other_only)
    }
}

/// Forward-only position in a table's attack sequence.
struct Cursor<'a> {
    attacks: &'a [Attack],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(table: &'a FlipTable) -> Self {
        Cursor {
            attacks: table.attacks(),
            pos: 0,
        }
    }

    fn has_next(&self) -> bool {
        self.pos < self.attacks.len()
    }

    fn peek(&self) -> Option<&'a Attack> {
        self.attacks.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn rest(&self) -> &'a [Attack] {
        &self.attacks[self.pos.min(self.attacks.len())..]
    }
}

/// Merge-join over two tables sorted by unique targets.
///
/// Attacks whose targets appear on one side only go wholly to that side's
/// output. Attacks on shared targets are split flip by flip; an empty
/// one-sided part is dropped, the common part is always kept.
pub(crate) fn diff_tables(a: &FlipTable, b: &FlipTable) -> TableDiff {
    let mut self_only = vec![];
    let mut common = vec![];
    let mut other_only = vec![];

    let mut ca = Cursor::new(a);
    let mut cb = Cursor::new(b);
    while ca.has_next() && cb.has_next() {
        let (Some(sa), Some(ob)) = (ca.peek(), cb.peek()) else {
            break;
        };
        match sa.targets().cmp(ob.targets()) {
            Ordering::Less => {
                self_only.push(sa.clone());
                ca.advance();
            }
            Ordering::Greater => {
                other_only.push(ob.clone());
                cb.advance();
            }
            Ordering::Equal => {
                let d = sa.split(ob);
                if d.self_only.has_flips() {
                    self_only.push(d.self_only);
                }
                common.push(d.common);
                if d.other_only.has_flips() {
                    other_only.push(d.other_only);
                }
                ca.advance();
                cb.advance();
            }
        }
    }
    self_only.extend_from_slice(ca.rest());
    other_only.extend_from_slice(cb.rest());

    debug!(
        "diff: {} self-only, {} common, {} other-only attacks",
        self_only.len(),
        common.len(),
        other_only.len()
    );
    TableDiff {
        self_only: FlipTable::from_sorted(self_only),
        common: FlipTable::from_sorted(common),
        other_only: FlipTable::from_sorted(other_only),
    }
}
