#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs headless Wave Director sessions.

mod config;
mod simulation;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::simulation::{SimulationOptions, SimulationReport};

#[derive(Debug, Parser)]
#[command(name = "wave-director", version)]
#[command(about = "Headless driver for the adaptive wave engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plays a full session and prints a per-round summary
    Simulate(SimulateArgs),
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// TOML file overriding the default tuning
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of rounds in the session, boss round included
    #[arg(long)]
    rounds: Option<u32>,

    /// Session seed
    #[arg(long)]
    seed: Option<u64>,

    /// Damage per second dealt to the leading unit
    #[arg(long, default_value_t = 12.0)]
    defense_dps: f32,

    /// Simulation step in milliseconds
    #[arg(long, default_value_t = 100)]
    step_ms: u64,

    /// Stop after this many simulated seconds
    #[arg(long, default_value_t = 3600)]
    max_seconds: u64,

    /// Use the fallback generator for every adaptive round
    #[arg(long)]
    no_controller: bool,
}

/// Entry point for the Wave Director command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Simulate(args) => simulate(args),
    }
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let mut config = config::load(args.config.as_deref())?;
    if let Some(rounds) = args.rounds {
        config.scheduler.total_rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.scheduler.seed = seed;
    }
    let options = SimulationOptions {
        step: Duration::from_millis(args.step_ms),
        defense_dps: args.defense_dps,
        max_time: Duration::from_secs(args.max_seconds),
        use_controller: !args.no_controller,
    };

    let report = simulation::run(&config, &options)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!(
        "{:>5}  {:<24} {:>5} {:>7} {:>6} {:>6} {:>5} {:>6}",
        "round", "name", "units", "reached", "reward", "mult", "lives", "funds"
    );
    for summary in &report.rounds {
        let marker = if summary.completed { "" } else { " (unfinished)" };
        println!(
            "{:>5}  {:<24} {:>5} {:>7} {:>6} {:>6.2} {:>5} {:>6}{marker}",
            summary.round.get(),
            summary.name,
            summary.units,
            summary.reached_end,
            summary.reward,
            summary.multiplier,
            summary.lives,
            summary.funds,
        );
    }
    println!(
        "{:?} after {:.1}s",
        report.outcome,
        report.elapsed.as_secs_f32()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_flags_parse() {
        let cli = Cli::try_parse_from([
            "wave-director",
            "simulate",
            "--rounds",
            "5",
            "--seed",
            "9",
            "--defense-dps",
            "20",
            "--no-controller",
        ])
        .expect("valid arguments");
        let Command::Simulate(args) = cli.command;
        assert_eq!(args.rounds, Some(5));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.defense_dps, 20.0);
        assert_eq!(args.step_ms, 100);
        assert!(args.no_controller);
        assert!(args.config.is_none());
    }

    #[test]
    fn unknown_subcommands_are_rejected() {
        assert!(Cli::try_parse_from(["wave-director", "train"]).is_err());
    }
}
