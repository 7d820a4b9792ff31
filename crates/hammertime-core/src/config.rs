use crate::Result;
use crate::fliptable::ExtrapMode;
use crate::util::{DEFAULT_BASELINE, DEFAULT_CELL_SIZE};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Parameters for decoding profiles and persisting fliptables.
///
/// Every field has a default, so a configuration file only needs to name the
/// values it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FliptableConfig {
    /// Bytes per DRAM column cell; profile offsets are split into column and byte with it
    pub cell_size: u32,
    /// Baseline byte used for the primary line of the text encoding
    pub baseline: u8,
    /// Global row distance for binary tables (None = infer from the first attack)
    pub distance: Option<u32>,
    /// Extrapolation mode for lookups in binary tables
    pub extrap: ExtrapMode,
}

impl Default for FliptableConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            baseline: DEFAULT_BASELINE,
            distance: None,
            extrap: ExtrapMode::None,
        }
    }
}

impl FliptableConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_jsonfile(filepath: impl AsRef<Path>) -> Result<FliptableConfig> {
        let mut file = File::open(filepath.as_ref())?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let config: FliptableConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Cell size, never zero.
    pub(crate) fn cell_size(&self) -> u32 {
        self.cell_size.max(1)
    }
}
