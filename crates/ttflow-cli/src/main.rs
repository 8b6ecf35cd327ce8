//! CLI for ttflow: inspect and exercise time-triggered send schedules.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ttflow")]
#[command(about = "ttflow: time-triggered send scheduling for virtual switch ports")]
#[command(version = ttflow_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and print the macro-period schedule for a flow set
    Plan {
        /// Path to a JSON flow set (array of entries)
        file: PathBuf,

        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Query which flow transmits next at a given time
    Next {
        /// Path to a JSON flow set
        file: PathBuf,

        /// Query time in nanoseconds
        #[arg(long)]
        at: u64,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Step through firings deterministically on a virtual clock
    Simulate {
        /// Path to a JSON flow set
        file: PathBuf,

        /// Number of firings to step through
        #[arg(long, default_value_t = 16)]
        count: u32,

        /// Virtual start time in nanoseconds
        #[arg(long, default_value_t = 0)]
        start: u64,
    },

    /// Classify a hex-encoded frame and optionally push or pop the TT shim
    Shim {
        /// Frame as hex, whitespace allowed (e.g. from tcpdump -xx)
        hex: String,

        /// Convert TRDP to TT (push the shim)
        #[arg(long, conflicts_with = "decap")]
        encap: bool,

        /// Convert TT to TRDP (pop the shim)
        #[arg(long)]
        decap: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Plan { file, json } => commands::plan::run(&file, json),
        Commands::Next { file, at, json } => commands::next::run(&file, at, json),
        Commands::Simulate { file, count, start } => commands::simulate::run(&file, count, start),
        Commands::Shim { hex, encap, decap } => commands::shim::run(&hex, encap, decap),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
