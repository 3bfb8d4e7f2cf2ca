//! Cache hierarchy simulator CLI.
//!
//! This binary provides a single entry point for simulation runs. It performs:
//! 1. **Run:** Build the hierarchy from a JSON configuration, replay one trace per requester,
//!    and print (or emit as JSON) the statistics.
//! 2. **Check config:** Build the hierarchy without simulating and print its configuration,
//!    including every address mask.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cohsim_core::config::Config;
use cohsim_core::sim::{Simulator, load_trace_file};
use cohsim_core::soc::System;

#[derive(Parser, Debug)]
#[command(
    name = "cohsim",
    author,
    version,
    about = "Cycle-level cache hierarchy and MOESI coherence simulator",
    long_about = "Replay memory access traces through a configurable multi-level cache hierarchy.\n\nExamples:\n  cohsim run --config hierarchy.json --trace cpu0.trace --trace cpu1.trace\n  cohsim run --trace cpu0.trace --warmup 10000 --json-stats\n  cohsim check-config --config hierarchy.json"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate the hierarchy replaying one trace per requester.
    Run {
        /// JSON configuration; the built-in two-core hierarchy when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Trace file for the next requester, in configuration order.
        #[arg(short, long = "trace", required = true)]
        traces: Vec<PathBuf>,

        /// Stop after this many cycles (defaults to the configured limit).
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Cycles to simulate before the statistics are reset.
        #[arg(long, default_value_t = 0)]
        warmup: u64,

        /// Print the statistics as JSON instead of tables.
        #[arg(long)]
        json_stats: bool,
    },

    /// Validate a configuration and print the resulting hierarchy.
    CheckConfig {
        /// JSON configuration; the built-in two-core hierarchy when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            traces,
            max_cycles,
            warmup,
            json_stats,
        } => cmd_run(config, &traces, max_cycles, warmup, json_stats),
        Commands::CheckConfig { config } => cmd_check_config(config),
    };

    if let Err(e) = result {
        eprintln!("\n[!] FATAL: {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config, cohsim_core::common::SimError> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

/// Builds the simulator, loads the traces, and runs warm-up and measurement.
fn cmd_run(
    config: Option<PathBuf>,
    traces: &[PathBuf],
    max_cycles: Option<u64>,
    warmup: u64,
    json_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    if traces.len() > config.requesters.len() {
        return Err(format!(
            "{} traces given but the configuration has {} requesters",
            traces.len(),
            config.requesters.len()
        )
        .into());
    }

    let mut sim = Simulator::new(&config)?;
    for (requester, path) in traces.iter().enumerate() {
        let entries = load_trace_file(path)?;
        tracing::info!(requester, path = %path.display(), accesses = entries.len(), "trace loaded");
        sim.load_trace(requester, entries)?;
    }

    if warmup > 0 {
        let _ = sim.run(Some(warmup))?;
        sim.reset_statistics();
    }
    let limit = max_cycles.map(|m| m.saturating_sub(sim.cycle()));
    let _ = sim.run(limit)?;
    sim.final_statistics();

    if json_stats {
        println!("{}", serde_json::to_string_pretty(&sim.report())?);
    } else {
        sim.print_statistics();
    }
    Ok(())
}

/// Builds the hierarchy and prints its configuration.
fn cmd_check_config(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let system = System::new(&config)?;
    print!("{}", system.print_configuration());
    println!("[*] Configuration OK");
    Ok(())
}
