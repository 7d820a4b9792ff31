//! Decoding of profile logs.
//!
//! A profile log holds one line per hammering run:
//!
//! ```text
//! (0 0 0 0   64   0) (0 0 0 0   66   0) : (0 0 0 0   65   0) 0010|fe|ff
//! ```
//!
//! - [`decode_line`] parses one line into a [`HamRun`].
//! - [`Corruption`] expands a logged byte mismatch into bit flips.
//! - [`AttackReader`] merges consecutive runs on the same targets into attacks.
mod attacks;
mod corruption;
mod decode;

pub use self::attacks::AttackReader;
pub use self::corruption::Corruption;
pub use self::decode::{HamRun, decode_line};
