use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use crate::fliptable::Flip;
use crate::memory::DRAMAddr;
use crate::profile::Corruption;
use crate::{Error, Result};

/// One hammering run as logged by the profiler.
///
/// Victim rows keep the order of their first appearance; a victim row that is
/// logged more than once within a line accumulates all its corruptions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HamRun {
    /// Hammered rows
    pub targets: Vec<DRAMAddr>,
    /// Victim rows and the corruptions observed in them
    pub victims: Vec<(DRAMAddr, Vec<Corruption>)>,
}

impl HamRun {
    /// Creates a run without victims.
    pub fn new(targets: Vec<DRAMAddr>) -> Self {
        HamRun {
            targets,
            victims: vec![],
        }
    }

    /// Records a corruption in `victim`, appending to an earlier entry for the same row.
    pub fn push(&mut self, victim: DRAMAddr, corruption: Corruption) {
        match self.victims.iter_mut().find(|(v, _)| *v == victim) {
            Some((_, corruptions)) => corruptions.push(corruption),
            None => self.victims.push((victim, vec![corruption])),
        }
    }

    /// Returns true if no corruption was recorded.
    pub fn is_empty(&self) -> bool {
        self.victims.is_empty()
    }

    /// Expands all corruptions of this run into single bit flips.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if a corruption lies past the last column.
    pub fn flips(&self, cell_size: u32) -> Result<Vec<Flip>> {
        let mut flips = vec![];
        for (victim, corruptions) in &self.victims {
            for c in corruptions {
                flips.extend(c.flips(*victim, cell_size)?);
            }
        }
        Ok(flips)
    }
}

impl Display for HamRun {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for t in &self.targets {
            write!(f, "{} ", t)?;
        }
        write!(f, ":")?;
        for (victim, corruptions) in &self.victims {
            write!(f, " {}", victim)?;
            for c in corruptions {
                write!(f, " {}", c)?;
            }
        }
        Ok(())
    }
}

lazy_static! {
    static ref TOKEN_RE: Regex =
        Regex::new(r"^(?:\(([^()]*)\)|([[:xdigit:]]+)\|([[:xdigit:]]+)\|([[:xdigit:]]+))")
            .expect("static token regex");
}

enum Token {
    Addr(DRAMAddr),
    Corruption(Corruption),
}

fn parse_hex<T: TryFrom<u64>>(field: &str, what: &str) -> Result<T> {
    let value = u64::from_str_radix(field, 16)
        .map_err(|_| Error::parse(format!("invalid hex {} '{}'", what, field)))?;
    T::try_from(value).map_err(|_| Error::parse(format!("{} '{}' out of range", what, field)))
}

fn parse_addr(inner: &str) -> Result<DRAMAddr> {
    let fields: Vec<&str> = inner.split_whitespace().collect();
    if fields.len() != 5 && fields.len() != 6 {
        return Err(Error::parse(format!(
            "expected 5 or 6 address fields, got {} in '({})'",
            fields.len(),
            inner
        )));
    }
    Ok(DRAMAddr {
        chan: parse_hex(fields[0], "channel")?,
        dimm: parse_hex(fields[1], "DIMM")?,
        rank: parse_hex(fields[2], "rank")?,
        bank: parse_hex(fields[3], "bank")?,
        row: parse_hex(fields[4], "row")?,
        col: match fields.get(5) {
            Some(col) => parse_hex(col, "column")?,
            None => 0,
        },
    })
}

/// Parses an address as logged, with or without the surrounding parentheses.
impl FromStr for DRAMAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let inner = s
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(s);
        parse_addr(inner)
    }
}

fn tokenize(mut rest: &str) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }
        let caps = TOKEN_RE
            .captures(rest)
            .ok_or_else(|| Error::parse(format!("unexpected input '{}'", rest)))?;
        let token = match caps.get(1) {
            Some(inner) => Token::Addr(parse_addr(inner.as_str())?),
            None => Token::Corruption(Corruption::new(
                parse_hex(&caps[2], "offset")?,
                parse_hex(&caps[3], "observed byte")?,
                parse_hex(&caps[4], "expected byte")?,
            )),
        };
        tokens.push(token);
        rest = &rest[caps[0].len()..];
    }
}

/// Decodes one profile line of the form `TARGET+ : (VICTIM CORRUPTION+)*`.
///
/// Addresses are parenthesised hex fields `(chan dimm rank bank row [col])`,
/// corruptions are `offset|got|exp` in hex.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the line does not match the grammar. There is
/// no partial recovery.
pub fn decode_line(line: &str) -> Result<HamRun> {
    trace!("decoding line: {}", line.trim_end());
    let (targ, vict) = line
        .split_once(':')
        .ok_or_else(|| Error::parse("missing ':' between targets and victims"))?;

    let mut run = HamRun::default();
    for token in tokenize(targ)? {
        match token {
            Token::Addr(a) => run.targets.push(a),
            Token::Corruption(c) => {
                return Err(Error::parse(format!("corruption {} among targets", c)));
            }
        }
    }
    if run.targets.is_empty() {
        return Err(Error::parse("no target address"));
    }

    let mut victim: Option<(DRAMAddr, bool)> = None;
    for token in tokenize(vict)? {
        match token {
            Token::Addr(a) => {
                if let Some((v, false)) = victim {
                    return Err(Error::parse(format!("victim {} without corruptions", v)));
                }
                victim = Some((a, false));
            }
            Token::Corruption(c) => match victim.as_mut() {
                Some((v, seen)) => {
                    *seen = true;
                    run.push(*v, c);
                }
                None => return Err(Error::parse(format!("corruption {} without victim", c))),
            },
        }
    }
    if let Some((v, false)) = victim {
        return Err(Error::parse(format!("victim {} without corruptions", v)));
    }
    Ok(run)
}
