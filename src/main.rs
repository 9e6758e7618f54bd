//! Breakout scanner - main entry point
//!
//! This binary provides three subcommands:
//! - scan: Scan the stock universe for breakouts and save the results
//! - instruments: Refresh the cached instrument master
//! - universe: Rebuild the list of stocks to scan

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "breakout-scanner")]
#[command(about = "Daily breakout scanner for NSE equities", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "configs/scanner.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the universe for breakouts
    Scan {
        /// Scan the existing stocks file instead of rebuilding the universe first
        #[arg(long)]
        skip_universe: bool,

        /// Lookback window for the rolling high and average volume
        #[arg(long)]
        lookback: Option<usize>,

        /// Keep non-breakout verdicts in the results file
        #[arg(long)]
        all: bool,
    },

    /// Download the instrument master if the cache is stale
    Instruments {
        /// Download even when today's cache exists
        #[arg(short, long)]
        force: bool,
    },

    /// Build the stocks-to-scan list from the instrument master
    Universe {
        /// Output CSV (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Scan { .. } => "scan",
        Commands::Instruments { .. } => "instruments",
        Commands::Universe { .. } => "universe",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Scan {
            skip_universe,
            lookback,
            all,
        } => commands::scan::run(&cli.config, skip_universe, lookback, all),

        Commands::Instruments { force } => commands::instruments::run(&cli.config, force),

        Commands::Universe { output } => commands::universe::run(&cli.config, output),
    }
}
