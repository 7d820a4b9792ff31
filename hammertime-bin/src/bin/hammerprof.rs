use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hammertime_bin::{init_logging_with_progress, load_config};
use hammertime_core::profile::AttackReader;
use hammertime_core::{FlipTable, LegacyTable};
use log::info;

/// Compiles a profile log into a binary fliptable.
#[derive(Debug, Parser)]
struct CliArgs {
    /// Profile log to read.
    profile: PathBuf,
    /// Binary fliptable to write.
    output: PathBuf,
    /// JSON configuration file.
    #[clap(long = "config")]
    config: Option<PathBuf>,
    /// Row distance between the two targets; inferred from the first attack if absent.
    #[clap(long = "distance")]
    distance: Option<u32>,
}

fn main() -> Result<()> {
    let _progress = init_logging_with_progress()?;
    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);
    let config = load_config(args.config.as_deref())?;
    let distance = args.distance.or(config.distance);

    let mut reader = AttackReader::open(&args.profile, &config)?;
    if let Some(d) = distance {
        reader = reader.with_distance(i32::try_from(d)?);
    }
    let table = FlipTable::new(reader.collect::<hammertime_core::Result<Vec<_>>>()?);
    let legacy = LegacyTable::from_fliptable(&table, distance)?;

    println!("Ranges: {}", legacy.ranges().len());
    println!("Hammers: {}", legacy.hammers().len());
    println!("Flips: {}", legacy.flip_records().len());
    legacy.write(&args.output)?;
    Ok(())
}
