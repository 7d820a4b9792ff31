//! # Hammertime tools
//!
//! Command line front ends for `hammertime-core`. Every tool takes an optional
//! `--config` JSON file (see [`FliptableConfig`]) and logs through
//! `env_logger`, filtered by `RUST_LOG` and defaulting to `info`.
//!
//! ## Binaries
//!
//! - `hammerprof`: Profile log to legacy binary fliptable.
//! - `common-flips`: Flips seen in every one of several profiles.
//! - `hammerstats`: Attack and flip counts per file.
//! - `prettyprofile`: Human-readable rendering of a profile.
//! - `ftdiff`: Three-way diff of two fliptables.
//! - `ftlookup`: Target lookups in a binary fliptable.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use hammertime_core::FliptableConfig;
use indicatif::{MultiProgress, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::debug;
use serde::Serialize;

pub fn init_logging_with_progress() -> anyhow::Result<MultiProgress> {
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let progress = MultiProgress::new();
    LogWrapper::new(progress.clone(), logger).try_init()?;
    Ok(progress)
}

/// Extension trait for creating named progress bars.
pub trait NamedProgress {
    /// Creates a progress bar style with a name label.
    fn named_bar(name: &str) -> Self;
}

impl NamedProgress for ProgressStyle {
    fn named_bar(name: &str) -> Self {
        let fmt = format!(
            "{:<31} {{wide_bar:40.cyan/blue}} {{pos:>5}}/{{len:<5}} [{{elapsed_precise}}] {{msg}}",
            name
        );
        ProgressStyle::default_bar()
            .template(&fmt)
            .unwrap_or(ProgressStyle::default_bar())
    }
}

/// Loads the configuration file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<FliptableConfig> {
    let config = match path {
        Some(path) => FliptableConfig::from_jsonfile(path)?,
        None => FliptableConfig::default(),
    };
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Opens `path` for writing; `-` is standard output.
pub fn output_writer(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(std::io::stdout().lock())));
    }
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}

/// Appends `suffix` to the file name of `prefix`.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// A JSON report with the time it was produced.
#[derive(Debug, Serialize)]
pub struct Report<T> {
    /// RFC 3339 timestamp
    date: String,
    /// Tool specific payload
    data: T,
}

impl<T: Serialize> Report<T> {
    pub fn new(data: T) -> Self {
        Report {
            date: chrono::Local::now().to_rfc3339(),
            data,
        }
    }

    /// Writes the report as pretty JSON.
    pub fn write_to(&self, writer: &mut impl Write) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_keeps_directory() {
        assert_eq!(
            with_suffix(Path::new("out/run1"), ".common"),
            PathBuf::from("out/run1.common")
        );
    }

    #[test]
    fn report_serializes_payload() {
        let mut buf = vec![];
        Report::new(vec![1, 2, 3]).write_to(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["data"], serde_json::json!([1, 2, 3]));
        assert!(value["date"].is_string());
    }
}
