use std::{path::PathBuf, time::Instant};

use clap::Parser;
use hh_network::{
    config::PrepConfig,
    error::Result,
    memory::MemoryGovernor,
    shortcuts::build_network_shortcuts,
    source::memory_graph::InMemoryRoadGraph,
    store::{GraphStore, OpenMode},
};
use log::info;

/// Computes the segments between the stored border points
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Road graph files in .json or .bincode format
    #[arg(short, long, num_args = 1.., required = true)]
    graph: Vec<PathBuf>,
    /// Preparation store (.hhdb)
    #[arg(short, long)]
    store: PathBuf,
    /// Optional configuration in .json format
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Drop all segments and compute them again
    #[arg(short, long)]
    rebuild: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = PrepConfig::load(args.config.as_deref())?;

    let start = Instant::now();
    let mut source = InMemoryRoadGraph::from_files(args.graph.as_slice())?;
    info!("it took {:?} to load the road graph", start.elapsed());

    let mode = if args.rebuild {
        OpenMode::RecreateSegments
    } else {
        OpenMode::Read
    };
    let mut store = GraphStore::open(&args.store, mode, config.store.batch_size)?;
    let mut governor = MemoryGovernor::new(&config.memory);

    let start = Instant::now();
    let stats = build_network_shortcuts(&config, &mut source, &mut store, &mut governor)?;
    info!(
        "Built {} segments for {} points ({} skipped, {} reloads), took {:?}",
        stats.segments,
        stats.points,
        stats.skipped,
        governor.reloads(),
        start.elapsed()
    );
    Ok(())
}
