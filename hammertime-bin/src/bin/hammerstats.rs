use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hammertime_bin::{Report, init_logging_with_progress, load_config};
use hammertime_core::FlipTable;
use hammertime_core::fliptable::TableStats;
use log::info;
use serde::Serialize;

/// Prints attack and flip counts of profile logs or text fliptables.
#[derive(Debug, Parser)]
struct CliArgs {
    /// Files to summarize.
    #[clap(required = true)]
    files: Vec<PathBuf>,
    /// Emit a JSON report instead of text.
    #[clap(long = "json")]
    json: bool,
    /// JSON configuration file.
    #[clap(long = "config")]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FileStats {
    file: PathBuf,
    stats: TableStats,
}

fn main() -> Result<()> {
    let _progress = init_logging_with_progress()?;
    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);
    let config = load_config(args.config.as_deref())?;

    let mut all = vec![];
    for file in &args.files {
        let stats = FlipTable::load_with_config(file, &config)?.stats();
        if !args.json {
            let hammers = stats.hammers.to_string();
            println!("Stats for {}:", file.display());
            println!("Hammers: {}", hammers);
            println!("w/flips: {:width$}", stats.with_flips, width = hammers.len());
            println!("Total Bit Flips: {}", stats.total_flips);
        }
        all.push(FileStats {
            file: file.clone(),
            stats,
        });
    }
    if args.json {
        Report::new(all).write_to(&mut std::io::stdout().lock())?;
    }
    Ok(())
}
