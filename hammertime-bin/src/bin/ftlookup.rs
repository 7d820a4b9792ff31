use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use hammertime_bin::{init_logging_with_progress, load_config};
use hammertime_core::fliptable::ExtrapMode;
use hammertime_core::LegacyTable;
use hammertime_core::memory::DRAMAddr;
use log::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Extrap {
    None,
    PerBank,
    PerBankTrunc,
    PerBankFit,
}

impl From<Extrap> for ExtrapMode {
    fn from(e: Extrap) -> Self {
        match e {
            Extrap::None => ExtrapMode::None,
            Extrap::PerBank => ExtrapMode::PerBank,
            Extrap::PerBankTrunc => ExtrapMode::PerBankTrunc,
            Extrap::PerBankFit => ExtrapMode::PerBankFit,
        }
    }
}

/// Looks up the flips a binary fliptable predicts for hammering some rows.
#[derive(Debug, Parser)]
struct CliArgs {
    /// Binary fliptable.
    table: PathBuf,
    /// First target rows, as logged: `(chan dimm rank bank row [col])` in hex.
    #[clap(required = true)]
    addrs: Vec<DRAMAddr>,
    /// Extrapolation mode; overrides the configuration file.
    #[clap(long = "extrap", value_enum)]
    extrap: Option<Extrap>,
    /// JSON configuration file.
    #[clap(long = "config")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _progress = init_logging_with_progress()?;
    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);
    let config = load_config(args.config.as_deref())?;
    let mode = args.extrap.map(ExtrapMode::from).unwrap_or(config.extrap);

    let table = LegacyTable::read(&args.table)?;
    info!("Row distance {}, extrapolation {:?}", table.dist(), mode);
    for addr in &args.addrs {
        match table.lookup(*addr, mode) {
            None => println!("{}: no data", addr),
            Some(res) => {
                if res.is_extrapolated() {
                    println!(
                        "{}: extrapolated from row {}",
                        addr,
                        addr.add_row(-res.row_offset).row
                    );
                } else {
                    println!("{}:", addr);
                }
                for f in res.shifted_flips() {
                    println!(
                        "\tBit flip on row {:6}, column {:4}, bit {:2}: {}",
                        f.addr.row, f.addr.col, f.bit, f.direction
                    );
                }
            }
        }
    }
    Ok(())
}
