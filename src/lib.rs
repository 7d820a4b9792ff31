//! # Hammertime
//!
//! Facade over [`hammertime_core`]. See the core crate for the data model
//! (DRAM addresses, bit flips, attacks, fliptables) and the codecs.
pub use hammertime_core::*;
