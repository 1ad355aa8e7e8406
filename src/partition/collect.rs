use std::time::Instant;

use ahash::{HashSet, HashSetExt};
use log::{debug, info, warn};

use super::{FullNetwork, NetworkCluster, NetworkPartitioner};
use crate::{
    config::PrepConfig,
    error::{PrepError, Result},
    geo::{get_31_tile_number_x, get_31_tile_number_y},
    graphs::ClusterIndex,
    memory::MemoryGovernor,
    source::{RegionInfo, RoadGraphSource},
    store::{region::RoutingRegion, GraphStore},
    utility::get_progressbar_long_jobs,
};

/// Partition statistics over all processed clusters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectStats {
    pub clusters: usize,
    pub isolated_islands: usize,
    pub total_border_points: usize,
    pub min_border: Option<usize>,
    pub max_border: usize,
    pub min_points: Option<usize>,
    pub max_points: usize,
    pub interior_points: usize,
    pub estimated_shortcuts: usize,
    pub network_points: usize,
    pub regions_processed: usize,
    pub regions_skipped: usize,
    pub stopped_early: bool,
}

impl CollectStats {
    pub fn add_cluster(&mut self, cluster: &NetworkCluster) {
        let border = cluster.border.len();
        let points = cluster.interior.len();
        self.clusters += 1;
        if border == 0 {
            self.isolated_islands += 1;
        } else {
            self.min_border = Some(self.min_border.map_or(border, |min| min.min(border)));
        }
        self.max_border = self.max_border.max(border);
        self.total_border_points += border;
        self.estimated_shortcuts += cluster.estimated_shortcuts();
        self.max_points = self.max_points.max(points);
        self.min_points = Some(self.min_points.map_or(points, |min| min.min(points)));
        self.interior_points += points;
    }

    pub fn log(&self) {
        let clusters = self.clusters.max(1) as f64;
        info!(
            "RESULT {} points -> {} border points, {} clusters ({} isolated), {} est shortcuts",
            self.interior_points,
            self.network_points,
            self.clusters,
            self.isolated_islands,
            self.estimated_shortcuts
        );
        info!(
            "       {:.1} avg / {} min / {} max border points per cluster, {:.1} avg / {} min / {} max points in cluster",
            self.total_border_points as f64 / clusters,
            self.min_border.unwrap_or(0),
            self.max_border,
            self.interior_points as f64 / clusters,
            self.min_points.unwrap_or(0),
            self.max_points
        );
    }
}

/// Partition phase: walks every region, grows clusters from its roads and
/// persists their border points. Each region is committed as a whole.
pub fn collect_network_points(
    config: &PrepConfig,
    source: &mut dyn RoadGraphSource,
    store: &mut GraphStore,
    governor: &mut MemoryGovernor,
) -> Result<CollectStats> {
    if let Some([lat, lon]) = config.partition.debug_point {
        return collect_single_cluster(config, source, store, lat, lon);
    }

    let mut names = HashSet::new();
    let mut infos: Vec<RegionInfo> = Vec::new();
    for info in source.regions() {
        if names.insert(info.name.clone()) {
            infos.push(info);
        } else {
            warn!("Ignore route region {} as duplicate", info.name);
        }
    }
    let mut regions = store.insert_regions(&infos)?;

    let mut network = FullNetwork::new();
    let mut next_cluster: ClusterIndex = 0;
    if config.partition.resume {
        network.network_points = store.load_network_point_indexes()?;
        next_cluster = store.next_cluster_index()?;
        info!(
            "Resuming with {} network points and {} clusters",
            network.network_points.len(),
            next_cluster
        );
    }

    let mut stats = CollectStats::default();
    let mut partitioner = NetworkPartitioner::new(&config.partition);
    let mut processed = 0;
    for current in 0..regions.len() {
        if config.partition.resume && regions[current].processed {
            info!("Skip processed region {}", regions[current].info.name);
            stats.regions_skipped += 1;
            continue;
        }
        start_region(current, &mut regions, &mut network, source, store, governor)?;
        store.begin_region()?;
        let result = process_region(
            config,
            &mut regions[current],
            &mut network,
            &mut partitioner,
            source,
            store,
            &mut next_cluster,
            &mut processed,
            &mut stats,
        );
        match result {
            Ok(complete) => {
                let region = &mut regions[current];
                info!(
                    "Saving visited {} points from {} to db...",
                    region.visited_count(),
                    region.info.name
                );
                if let Err(error) = store.commit_region(region, complete) {
                    store.rollback_region()?;
                    return Err(error);
                }
                region.processed = complete;
                region.unload();
                if complete {
                    stats.regions_processed += 1;
                } else {
                    warn!(
                        "Region {} saved incomplete, resume to finish it",
                        region.info.name
                    );
                }
            }
            Err(error) => {
                warn!("Region {} failed: {}", regions[current].info.name, error);
                store.rollback_region()?;
                return Err(error);
            }
        }
        if config.debug.limit_reached(processed) {
            stats.stopped_early = true;
            break;
        }
    }

    store.finalize_point_clusters()?;
    stats.network_points = network.network_points.len();
    stats.log();
    Ok(stats)
}

/// Loads the visited sets of intersecting regions and reopens the source on
/// their files only.
fn start_region(
    current: usize,
    regions: &mut [RoutingRegion],
    network: &mut FullNetwork,
    source: &mut dyn RoadGraphSource,
    store: &GraphStore,
    governor: &mut MemoryGovernor,
) -> Result<()> {
    info!(
        "Region {} {} of {}",
        regions[current].info.name,
        current + 1,
        regions.len()
    );
    for region in regions.iter_mut() {
        region.unload();
    }

    let sub_regions: Vec<usize> = (0..regions.len())
        .filter(|&other| other != current && regions[other].intersects(&regions[current]))
        .collect();
    let mut files: Vec<String> = sub_regions
        .iter()
        .map(|&other| regions[other].info.filename.clone())
        .collect();
    files.push(regions[current].info.filename.clone());
    files.sort();
    files.dedup();
    governor.maybe_reload(source, Some(files.as_slice()), true)?;

    network.clear_interior();
    for other in sub_regions {
        let region = &mut regions[other];
        let id = region.id;
        let visited = region.load_visited(store)?;
        network.load_region(id, visited.iter().copied());
    }

    // Clusters of an earlier incomplete run stay.
    let region = &mut regions[current];
    region.start_processing();
    let stored = store.load_region_points(region.id)?;
    if !stored.is_empty() {
        info!(
            "Continue region {} with {} visited points",
            region.info.name,
            stored.len()
        );
        network.load_region(region.id, stored.iter().copied());
        region.add_visited(stored);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_region(
    config: &PrepConfig,
    region: &mut RoutingRegion,
    network: &mut FullNetwork,
    partitioner: &mut NetworkPartitioner,
    source: &mut dyn RoadGraphSource,
    store: &mut GraphStore,
    next_cluster: &mut ClusterIndex,
    processed: &mut usize,
    stats: &mut CollectStats,
) -> Result<bool> {
    let seeds = source.region_roads(&region.info)?;
    let total = seeds.len().max(1);
    let bar = get_progressbar_long_jobs(&region.info.name, seeds.len() as u64);
    let start = Instant::now();
    let mut last_log = 0;

    let mut complete = config.debug.start_offset == 0;
    for (ind, seed) in seeds.into_iter().enumerate() {
        bar.inc(1);
        if ind < config.debug.start_offset {
            continue;
        }
        if config.debug.limit_reached(*processed) {
            complete = false;
            break;
        }
        let point = seed.point_id();
        if network.is_interior(point) || network.is_network_point(point) {
            continue;
        }
        let cluster = partitioner.build_cluster(network, source, seed, *next_cluster)?;
        *next_cluster += 1;
        *processed += 1;
        debug!(
            "CLUSTER: {} border <- {} points - {:?}",
            cluster.border.len(),
            cluster.interior.len(),
            cluster.start.identity
        );
        store.insert_cluster(cluster.index, &cluster.border, &mut network.network_points)?;
        region.add_visited(cluster.interior.iter().copied());
        stats.add_cluster(&cluster);

        if ind - last_log > 1000 {
            last_log = ind;
            info!(
                "{} {:.2}%: {} points -> {} border points, {} clusters ({:.1} s)",
                ind,
                ind as f64 * 100.0 / total as f64,
                stats.interior_points,
                network.network_points.len(),
                stats.clusters,
                start.elapsed().as_secs_f64()
            );
        }
    }
    bar.finish_and_clear();
    Ok(complete)
}

/// Builds the one cluster around the road edge closest to `lat, lon`.
fn collect_single_cluster(
    config: &PrepConfig,
    source: &mut dyn RoadGraphSource,
    store: &mut GraphStore,
    lat: f64,
    lon: f64,
) -> Result<CollectStats> {
    let x = get_31_tile_number_x(lon);
    let y = get_31_tile_number_y(lat);
    let seed = source
        .nearest_segment(x, y)?
        .ok_or_else(|| PrepError::Source(format!("no road near {} {}", lat, lon)))?;

    let mut network = FullNetwork::new();
    let mut partitioner = NetworkPartitioner::new(&config.partition);
    let cluster = partitioner.build_cluster(&mut network, source, seed, 0)?;
    store.insert_cluster(cluster.index, &cluster.border, &mut network.network_points)?;
    store.finalize_point_clusters()?;

    let mut stats = CollectStats::default();
    stats.add_cluster(&cluster);
    stats.network_points = network.network_points.len();
    stats.stopped_early = true;
    stats.log();
    Ok(stats)
}
