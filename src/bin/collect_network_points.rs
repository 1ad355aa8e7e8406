use std::{path::PathBuf, time::Instant};

use clap::Parser;
use hh_network::{
    config::PrepConfig,
    error::Result,
    memory::MemoryGovernor,
    partition::collect::collect_network_points,
    source::memory_graph::InMemoryRoadGraph,
    store::{GraphStore, OpenMode},
};
use log::info;

/// Partitions the road graph into clusters and stores their border points
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
    /// Continue a partition run, skipping committed regions
    #[arg(short, long)]
    resume: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = PrepConfig::load(args.config.as_deref())?;
    config.partition.resume |= args.resume;
    config.validate()?;

    let start = Instant::now();
    let mut source = InMemoryRoadGraph::from_files(args.graph.as_slice())?;
    info!("it took {:?} to load the road graph", start.elapsed());

    let mode = if config.partition.resume {
        OpenMode::Read
    } else {
        OpenMode::FullRecreate
    };
    let mut store = GraphStore::open(&args.store, mode, config.store.batch_size)?;
    let mut governor = MemoryGovernor::new(&config.memory);

    let start = Instant::now();
    let stats = collect_network_points(&config, &mut source, &mut store, &mut governor)?;
    info!(
        "Collected {} network points in {} clusters, took {:?}",
        stats.network_points,
        stats.clusters,
        start.elapsed()
    );
    Ok(())
}
