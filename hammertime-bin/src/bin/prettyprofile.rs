use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hammertime_bin::{init_logging_with_progress, load_config};
use hammertime_core::profile::decode_line;
use hammertime_core::{Attack, Targets};

/// Renders a profile log for humans.
#[derive(Debug, Parser)]
struct CliArgs {
    /// Profile log; `-` reads stdin.
    profile: PathBuf,
    /// JSON configuration file.
    #[clap(long = "config")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _progress = init_logging_with_progress()?;
    let args = CliArgs::parse();
    let config = load_config(args.config.as_deref())?;

    let input: Box<dyn BufRead> = if args.profile.as_os_str() == "-" {
        Box::new(BufReader::new(std::io::stdin().lock()))
    } else {
        Box::new(BufReader::new(File::open(&args.profile)?))
    };
    let mut out = std::io::stdout().lock();
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let run = decode_line(&line).with_context(|| format!("line {}", i + 1))?;
        let targets =
            Targets::from_slice(&run.targets).with_context(|| format!("line {}", i + 1))?;
        let flips = run
            .flips(config.cell_size)
            .with_context(|| format!("line {}", i + 1))?;
        let attack = Attack::new(targets, flips);
        writeln!(out, "{}", attack.pretty())?;
    }
    Ok(())
}
