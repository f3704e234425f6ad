//! blipsync CLI
//!
//! Developer tools for blipsync seed files.
//!
//! # Commands
//!
//! - `inspect` - Load a seed into an in-memory server and print statistics
//! - `simulate` - Run the server with in-process clients and the sweep loop

mod commands;

use clap::{Parser, Subcommand};
use commands::simulate::SimulateOptions;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// blipsync command-line tools.
#[derive(Parser)]
#[command(name = "blipsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a seed file and print registry statistics
    Inspect {
        /// Path to the seed file
        seed: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a local simulation with the reconciliation loop
    Simulate {
        /// Path to the seed file
        seed: PathBuf,

        /// How long to run, in seconds
        #[arg(short, long, default_value = "10")]
        seconds: u64,

        /// Override the sync interval in milliseconds
        #[arg(short, long)]
        interval_ms: Option<i64>,
    },
}

impl Commands {
    fn seed_path(&self) -> &PathBuf {
        match self {
            Commands::Inspect { seed, .. } | Commands::Simulate { seed, .. } => seed,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let seed = commands::load_seed(cli.command.seed_path())?;

    // Initialize logging
    let debug = cli.verbose || seed.config().debug_logging;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format, .. } => {
            commands::inspect::run(&seed, &format)?;
        }
        Commands::Simulate {
            seconds,
            interval_ms,
            ..
        } => {
            let options = SimulateOptions {
                duration: Duration::from_secs(seconds),
                interval_ms,
            };
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(commands::simulate::run(&seed, options))?;
        }
    }

    Ok(())
}
