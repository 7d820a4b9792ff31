//! # Hammertime Core
//!
//! `hammertime-core` turns the logs of Rowhammer profiling runs into
//! fliptables: compact, queryable and diffable records of observed bit flips.
//!
//! ## Architecture Overview
//!
//! Data flows leaf-first through the following components:
//!
//! - [`memory::DRAMAddr`] - A six-field DRAM cell coordinate with a packed total order.
//!
//! - [`profile`] module - Decodes profile log lines ([`profile::decode_line`]),
//!   expands byte corruptions into bit flips ([`profile::Corruption`]) and merges
//!   consecutive runs into attacks ([`profile::AttackReader`]).
//!
//! - [`fliptable`] module - The [`fliptable::FlipTable`] container with its text
//!   form, the three-way diff ([`fliptable::TableDiff`]) and the legacy binary
//!   layout ([`fliptable::LegacyTable`]) used by compiled consumers, with
//!   lookup and per-bank extrapolation ([`fliptable::ExtrapMode`]).
//!
//! - [`memory::AddrResolver`] - Maps attacks back to physical addresses.
//!
//! ## Errors
//!
//! Every fallible operation returns [`Result`]. Decoding and loading are
//! all-or-nothing: either a complete table is produced or an [`Error`] is.
//! The core never prints and never exits.

#![warn(missing_docs)]

mod config;
mod error;
pub mod fliptable;
pub mod memory;
pub mod profile;
pub mod util;

pub use crate::config::FliptableConfig;
pub use crate::error::{Error, Result};

pub use fliptable::{
    Attack, ExtrapMode, Flip, FlipDirection, FlipTable, LegacyTable, TableDiff, Targets,
};
