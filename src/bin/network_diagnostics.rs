use std::{path::PathBuf, time::Instant};

use clap::{Parser, ValueEnum};
use hh_network::{
    config::PrepConfig,
    diagnostics::{calculate_mid_points, run_monte_carlo_routing, run_second_level_routing},
    error::Result,
    store::{GraphStore, OpenMode},
};
use log::info;

#[derive(Debug, ValueEnum, Clone)]
enum Mode {
    Midpoints,
    MonteCarlo,
    SecondLevel,
}

/// Runs one of the diagnostic measurements on a prepared store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Preparation store (.hhdb)
    #[arg(short, long)]
    store: PathBuf,
    #[arg(short, long, value_enum)]
    mode: Mode,
    /// Optional configuration in .json format
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    iterations: Option<usize>,
    /// Hop limit of midpoint searches
    #[arg(long)]
    max_depth: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = PrepConfig::load(args.config.as_deref())?;
    if let Some(iterations) = args.iterations {
        config.diagnostics.iterations = iterations;
    }
    if let Some(max_depth) = args.max_depth {
        config.diagnostics.max_depth = max_depth;
    }
    if args.seed.is_some() {
        config.diagnostics.seed = args.seed;
    }
    config.validate()?;

    let mut store = GraphStore::open(&args.store, OpenMode::Read, config.store.batch_size)?;
    let start = Instant::now();
    match args.mode {
        Mode::Midpoints => {
            let stats = calculate_mid_points(&config.diagnostics, &mut store)?;
            info!("Midpoints of {} iterations saved", stats.iterations);
        }
        Mode::MonteCarlo => {
            let stats = run_monte_carlo_routing(&config.diagnostics, &store)?;
            info!(
                "{} of {} routes found, {} frequent points",
                stats.routed,
                stats.iterations,
                stats.frequent.len()
            );
        }
        Mode::SecondLevel => {
            let stats = run_second_level_routing(&config.diagnostics, &store)?;
            info!(
                "{} clusters merged into {}, {} of {} border points left",
                stats.clusters_before, stats.clusters_after, stats.points_after, stats.points_before
            );
        }
    }
    info!("took {:?}", start.elapsed());
    Ok(())
}
