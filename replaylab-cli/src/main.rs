//! ReplayLab CLI: run, validate and inspect replays.
//!
//! Commands:
//! - `run`: replay one or more TOML configs and save artifacts
//! - `validate`: parse a config and load its feeds without replaying
//! - `inspect`: print the summary of a saved artifact directory
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use replaylab_runner::{
    load_artifacts, load_run_data, run_batch, save_artifacts, RunConfig, ReplayReport,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI: deterministic replay execution and ledger engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one or more TOML configs. Multiple configs run in parallel.
    Run {
        /// Path to a TOML config file. Repeat for a batch.
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary without writing artifacts.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Parse a config and load every feed it names.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the summary of a saved run.
    Inspect {
        /// Artifact directory containing report.json.
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            configs,
            output_dir,
            dry_run,
        } => run_cmd(&configs, &output_dir, dry_run),
        Commands::Validate { config } => validate_cmd(&config),
        Commands::Inspect { dir } => {
            let report = load_artifacts(&dir)?;
            print_summary(&report);
            Ok(())
        }
    }
}

fn load_configs(paths: &[PathBuf]) -> Result<Vec<RunConfig>> {
    paths
        .iter()
        .map(|path| {
            RunConfig::from_file(path)
                .with_context(|| format!("invalid config: {}", path.display()))
        })
        .collect()
}

fn run_cmd(paths: &[PathBuf], output_dir: &Path, dry_run: bool) -> Result<()> {
    let configs = load_configs(paths)?;
    let results = run_batch(&configs);

    let mut failures = 0;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(report) => {
                print_summary(&report);
                if !dry_run {
                    let saved = save_artifacts(&report, output_dir)?;
                    println!("Artifacts saved to: {}", saved.dir.display());
                }
            }
            Err(err) => {
                error!(config = %path.display(), error = %err, "replay failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} replay(s) failed", paths.len());
    }
    Ok(())
}

fn validate_cmd(path: &Path) -> Result<()> {
    let config = RunConfig::from_file(path)
        .with_context(|| format!("invalid config: {}", path.display()))?;
    let data = load_run_data(&config)?;
    let run_id = config.run_id(&data.dataset_hash)?;

    info!(symbol = %config.symbol, run_id = %run_id, "config ok");
    println!("Symbol:            {}", config.symbol);
    println!("Slices:            {}", data.slices.len());
    println!("Intents:           {}", data.intents.len());
    println!("Corporate actions: {}", data.feeds.corporate_actions.len());
    println!("Borrow profiles:   {}", data.feeds.borrow_profiles.len());
    println!("Symbol mappings:   {}", data.feeds.symbol_mappings.len());
    println!("Delists:           {}", data.feeds.delists.len());
    println!("Dataset hash:      {}", data.dataset_hash);
    println!("Run id:            {run_id}");
    Ok(())
}

fn print_summary(report: &ReplayReport) {
    let s = &report.summary;
    println!();
    println!("=== Replay Result ===");
    if report.final_symbol == report.symbol {
        println!("Symbol:          {}", report.symbol);
    } else {
        println!("Symbol:          {} (now {})", report.symbol, report.final_symbol);
    }
    println!("Run id:          {}", report.run_id);
    println!("Intent source:   {}", report.intent_source);
    println!("Slices:          {}", s.slices);
    println!();
    println!("--- Orders ---");
    println!("Orders:          {}", s.orders);
    println!("Fills:           {} ({} partial)", s.fills, s.partial_fills);
    println!("Cancellations:   {}", s.cancellations);
    println!(
        "Rejections:      {} (locate {}, cash {}, margin {})",
        s.rejections(),
        s.locate_rejections,
        s.cash_rejections,
        s.margin_rejections
    );
    println!("Forced exits:    {}", s.forced_liquidations);
    println!();
    println!("--- Ledger ---");
    println!("Commission:      {}", s.total_commission);
    println!("Financing:       {}", s.total_financing);
    println!("Corp. actions:   {}", s.corporate_actions);
    println!("Settlements:     {}", s.settlements);
    if let Some(p) = &report.final_portfolio {
        println!("Position:        {} @ {}", p.position_quantity, p.average_price);
        println!("Cash:            {} ({} settled)", p.cash, p.settled_cash);
        println!("Realized P&L:    {}", p.realized_pnl);
        println!("Unrealized P&L:  {}", p.unrealized_pnl);
        println!("Equity:          {}", p.equity);
    }
    println!();
}
