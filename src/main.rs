mod chart;
mod commands;
mod config;
mod dataset;
mod derived;
mod input;
mod line;
mod reduce;
mod section;
mod stash;
mod table;
mod trace;

use clap::{Parser, Subcommand};
use config::MissingMetricPolicy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Extracts metrics from memory-system simulator logs, aggregates them
/// per channel or across runs, and writes chart series for rendering.
#[derive(Parser, Debug)]
#[command(name = "memsim-stats", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "memsim-stats.toml", global = true)]
    config: PathBuf,

    /// Debug logging, including per-file skip counts
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings, errors and the final summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-channel bar charts from one log with `<metric>_<channel>` keys
    Channels {
        /// Log file
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for chart series
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Cross-run charts from a directory of logs with a MemorySystem section
    MemorySystem {
        /// Directory of log files
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for chart series and the index file
        #[arg(short, long)]
        output: PathBuf,
        /// What to do when a derived metric's base metric is missing (overrides config)
        #[arg(long, value_enum)]
        on_missing: Option<MissingMetricPolicy>,
    },
    /// Stash occupancy charts from a directory of `cycle,percent` CSV files
    Stash {
        /// Directory of CSV files
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for chart series
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a `LD/ST <hex>` trace to SimpleO3 format
    ConvertTrace {
        /// Input trace
        #[arg(short, long)]
        input: PathBuf,
        /// Output trace
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    let config = match config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Command::Channels { input, output } => commands::channels(&config, input, output),
        Command::MemorySystem {
            input,
            output,
            on_missing,
        } => commands::memory_system(&config, input, output, *on_missing),
        Command::Stash { input, output } => commands::stash(&config, input, output),
        Command::ConvertTrace { input, output } => commands::convert_trace(input, output),
    };

    match result {
        Ok(summary) => println!("{summary}"),
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
