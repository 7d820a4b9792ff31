use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use log::{debug, trace};

use crate::fliptable::{Attack, Targets};
use crate::profile::{HamRun, decode_line};
use crate::{Error, FliptableConfig, Result};

/// Streams attacks out of a profile log.
///
/// Consecutive runs with the same targets are merged into one attack whose
/// flip set is the union of all their flips. When the targets change the
/// accumulated attack is emitted. The log is read once, front to back.
///
/// The first error ends the stream; callers that collect into a
/// `Result<Vec<_>>` get either every attack or the error.
pub struct AttackReader<R> {
    lines: Lines<R>,
    line_no: usize,
    cell_size: u32,
    distance: Option<i32>,
    pending: Option<Attack>,
    done: bool,
}

impl AttackReader<BufReader<File>> {
    /// Opens a profile log on disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, config: &FliptableConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(AttackReader::new(BufReader::new(file), config))
    }
}

impl<R: BufRead> AttackReader<R> {
    /// Creates a reader over any buffered source of profile lines.
    pub fn new(reader: R, config: &FliptableConfig) -> Self {
        AttackReader {
            lines: reader.lines(),
            line_no: 0,
            cell_size: config.cell_size(),
            distance: None,
            pending: None,
            done: false,
        }
    }

    /// Requires every attack to hammer two rows exactly `distance` rows apart
    /// (0 for single-sided hammering).
    pub fn with_distance(mut self, distance: i32) -> Self {
        self.distance = Some(distance);
        self
    }

    fn next_run(&mut self) -> Option<Result<HamRun>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some(decode_line(&line).map_err(|e| e.at_line(self.line_no)));
        }
        None
    }

    fn targets_of(&self, run: &HamRun) -> Result<Targets> {
        let targets = Targets::from_slice(&run.targets)
            .map_err(|e| annotate(e, self.line_no))?;
        if let Some(distance) = self.distance
            && targets.row_distance() != distance
        {
            return Err(Error::InconsistentTargets(format!(
                "line {}: target distance {} of {}, expected {}",
                self.line_no,
                targets.row_distance(),
                targets,
                distance
            )));
        }
        Ok(targets)
    }

    fn fail(&mut self, e: Error) -> Option<Result<Attack>> {
        self.done = true;
        self.pending = None;
        Some(Err(e))
    }
}

fn annotate(e: Error, line: usize) -> Error {
    match e {
        Error::InconsistentTargets(msg) => {
            Error::InconsistentTargets(format!("line {}: {}", line, msg))
        }
        e => e,
    }
}

impl<R: BufRead> Iterator for AttackReader<R> {
    type Item = Result<Attack>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let run = match self.next_run() {
                None => {
                    self.done = true;
                    if let Some(attack) = &self.pending {
                        debug!("{}: {} flips", attack.targets(), attack.num_flips());
                    }
                    return self.pending.take().map(Ok);
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(run)) => run,
            };
            let targets = match self.targets_of(&run) {
                Ok(targets) => targets,
                Err(e) => return self.fail(e),
            };
            let flips = match run.flips(self.cell_size) {
                Ok(flips) => flips,
                Err(e) => return self.fail(e.at_line(self.line_no)),
            };
            match self.pending.as_mut() {
                Some(attack) if *attack.targets() == targets => {
                    trace!("merging run on line {} into {}", self.line_no, targets);
                    attack.absorb(flips);
                }
                _ => {
                    let fresh = Attack::new(targets, flips);
                    if let Some(done) = self.pending.replace(fresh) {
                        debug!("{}: {} flips", done.targets(), done.num_flips());
                        return Some(Ok(done));
                    }
                }
            }
        }
    }
}
