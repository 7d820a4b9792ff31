use crate::fliptable::Targets;
use thiserror::Error;

/// Errors that can occur while decoding, merging, diffing or persisting fliptables.
#[derive(Error, Debug)]
pub enum Error {
    /// A profile line does not match the log grammar.
    #[error("Parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number, 0 if the line was decoded on its own
        line: usize,
        /// What did not match
        reason: String,
    },
    /// Target sets or row distances vary where a single value is required.
    #[error("Inconsistent targets: {0}")]
    InconsistentTargets(String),
    /// A binary fliptable is malformed.
    #[error("Invalid fliptable file: {0}")]
    Format(String),
    /// Attack merge or diff was invoked on attacks with different targets.
    #[error("Mismatched targets: {left} vs {right}")]
    MismatchedTargets {
        /// Targets of the receiving attack
        left: Targets,
        /// Targets of the argument attack
        right: Targets,
    },
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A configuration file could not be parsed.
    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        Error::Parse {
            line: 0,
            reason: reason.into(),
        }
    }

    /// Attaches a line number to a parse error, leaving other errors untouched.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Error::Parse { reason, .. } => Error::Parse { line, reason },
            e => e,
        }
    }
}

/// Result type used throughout `hammertime-core`.
pub type Result<T> = std::result::Result<T, Error>;
