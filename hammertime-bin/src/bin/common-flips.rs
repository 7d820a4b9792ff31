use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hammertime_bin::{NamedProgress, init_logging_with_progress, load_config, output_writer};
use hammertime_core::FlipTable;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Finds the bit flips common to several profile runs.
#[derive(Debug, Parser)]
struct CliArgs {
    /// Profile logs or text fliptables.
    #[clap(required = true)]
    profiles: Vec<PathBuf>,
    /// Output file; `-` writes to stdout.
    #[clap(long = "output", short = 'o', default_value = "-")]
    output: PathBuf,
    /// JSON configuration file.
    #[clap(long = "config")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let progress = init_logging_with_progress()?;
    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);
    let config = load_config(args.config.as_deref())?;

    let bar = progress.add(ProgressBar::new(args.profiles.len() as u64));
    bar.set_style(ProgressStyle::named_bar("Loading profiles"));
    let mut tables = Vec::with_capacity(args.profiles.len());
    for path in &args.profiles {
        bar.set_message(path.display().to_string());
        tables.push(FlipTable::load_with_config(path, &config)?);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let common = FlipTable::common_flips(tables);
    let stats = common.stats();
    info!(
        "{} hammers with {} common flips",
        stats.with_flips, stats.total_flips
    );
    let mut out = output_writer(&args.output)?;
    common.write_to(&mut out, &config)?;
    out.flush()?;
    Ok(())
}
