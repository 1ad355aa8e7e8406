use std::{path::PathBuf, time::Instant};

use clap::Parser;
use hh_network::{
    ch::run_contraction_hierarchy,
    config::PrepConfig,
    error::Result,
    store::{GraphStore, OpenMode},
};
use log::info;

/// Contracts the point graph of a store and saves shortcuts and ranks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Preparation store (.hhdb)
    #[arg(short, long)]
    store: PathBuf,
    /// Optional configuration in .json format
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Settled point budget of a witness search
    #[arg(short, long)]
    max_depth: Option<usize>,
    /// Percent of points to contract
    #[arg(short, long)]
    percent: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = PrepConfig::load(args.config.as_deref())?;
    if let Some(max_depth) = args.max_depth {
        config.contraction.max_witness_depth = max_depth;
    }
    if let Some(percent) = args.percent {
        config.contraction.contract_percent = percent as f64 / 100.0;
    }
    config.validate()?;

    let mut store = GraphStore::open(&args.store, OpenMode::Read, config.store.batch_size)?;
    let start = Instant::now();
    let stats = run_contraction_hierarchy(&config.contraction, &mut store)?;
    info!(
        "Contracted {} points with {} shortcuts, took {:?}",
        stats.contracted,
        stats.added,
        start.elapsed()
    );
    Ok(())
}
