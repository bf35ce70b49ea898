mod config;
mod detector;
mod group;
mod manager;
mod report;
mod stats;
mod synth;
mod table;
mod window;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate {
        #[arg(long, default_value_t = 4096)]
        n_rows: usize,

        #[arg(long, default_value_t = 4)]
        n_chan: usize,

        #[arg(long)]
        seed: Option<u64>,
    },

    Run {
        #[arg(long)]
        verbose: bool,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.work_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Generate {
            n_rows,
            n_chan,
            seed,
        } => mgr.generate_input(n_rows, n_chan, seed)?,
        Command::Run { verbose } => mgr.despike_inputs(verbose)?,
        Command::Clean => mgr.clean_outputs()?,
    }

    Ok(())
}
