use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hammertime_bin::{init_logging_with_progress, load_config, with_suffix};
use hammertime_core::FlipTable;
use log::info;

/// Splits two fliptables into flips only in A, common flips and flips only in B.
#[derive(Debug, Parser)]
struct CliArgs {
    /// First profile log or text fliptable.
    a: PathBuf,
    /// Second profile log or text fliptable.
    b: PathBuf,
    /// Prefix of the `.a-only`, `.common` and `.b-only` output files.
    #[clap(long = "prefix", default_value = "diff")]
    prefix: PathBuf,
    /// JSON configuration file.
    #[clap(long = "config")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _progress = init_logging_with_progress()?;
    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);
    let config = load_config(args.config.as_deref())?;

    let a = FlipTable::load_with_config(&args.a, &config)?;
    let b = FlipTable::load_with_config(&args.b, &config)?;
    let (a_only, common, b_only) = a.diff(&b).into_tuple();

    for (suffix, table) in [(".a-only", &a_only), (".common", &common), (".b-only", &b_only)] {
        let path = with_suffix(&args.prefix, suffix);
        table.save_with_config(&path, &config)?;
        println!(
            "{}: {} hammers, {} flips",
            path.display(),
            table.len(),
            table.num_flips()
        );
    }
    Ok(())
}
