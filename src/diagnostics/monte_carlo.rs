use std::time::Instant;

use itertools::Itertools;
use log::info;
use rand::Rng;

use super::rng;
use crate::{
    config::DiagnosticsConfig,
    error::Result,
    geo::{get_31_latitude_y, get_31_longitude_x},
    graphs::{network_graph::NetworkGraph, PointIndex},
    search::{
        dijkstra::{network_dijkstra, SearchLimits},
        dijkstra_data::DijkstraData,
    },
    store::GraphStore,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonteCarloStats {
    pub iterations: usize,
    pub routed: usize,
    /// How often every point index lay on a found route.
    pub counts: Vec<u32>,
    /// Points on more than 1% of the routes, most used first.
    pub frequent: Vec<(PointIndex, u32)>,
}

/// Counts every point of the shortest route from `start` to `end`. Returns
/// false when `end` is unreachable.
pub fn count_route(
    graph: &NetworkGraph,
    start: PointIndex,
    end: PointIndex,
    data: &mut DijkstraData,
    counts: &mut [u32],
) -> bool {
    let found = network_dijkstra(graph, start, Some(end), &SearchLimits::default(), |_| false, data);
    let Some(path) = found.and_then(|_| data.get_path(end)) else {
        return false;
    };
    for point in path {
        if let Some(count) = counts.get_mut(point as usize) {
            *count += 1;
        }
    }
    true
}

pub fn run_monte_carlo_routing(
    config: &DiagnosticsConfig,
    store: &GraphStore,
) -> Result<MonteCarloStats> {
    let start = Instant::now();
    let points = store.load_points()?;
    let graph = store.load_network_graph(false)?;
    let number_of_points = graph.number_of_points();
    info!(
        "Loaded {} points and {} segments",
        number_of_points,
        graph.number_of_edges()
    );

    let mut stats = MonteCarloStats {
        iterations: config.iterations,
        counts: vec![0; number_of_points],
        ..MonteCarloStats::default()
    };
    if number_of_points == 0 {
        return Ok(stats);
    }

    let mut rng = rng(config);
    let mut data = DijkstraData::new();
    for iteration in 0..config.iterations {
        if (iteration + 1) % 10 == 0 {
            info!("Routing {} ...", iteration + 1);
        }
        let from = rng.gen_range(0..number_of_points) as PointIndex;
        let to = rng.gen_range(0..number_of_points) as PointIndex;
        if count_route(&graph, from, to, &mut data, &mut stats.counts) {
            stats.routed += 1;
        }
    }

    let threshold = 0.01 * config.iterations as f64;
    stats.frequent = stats
        .counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count as f64 > threshold)
        .map(|(index, count)| (index as PointIndex, *count))
        .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
        .collect_vec();
    for (index, count) in &stats.frequent {
        if let Some(point) = points.get(*index as usize) {
            let (x, y) = point.midpoint();
            info!(
                "{} {:.4}, {:.4} - point {} ({})",
                count,
                get_31_latitude_y(y),
                get_31_longitude_x(x),
                point.index,
                point.road_id
            );
        }
    }

    info!(
        "Routing finished {:.2} s: {} of {} routes found",
        start.elapsed().as_secs_f64(),
        stats.routed,
        stats.iterations
    );
    Ok(stats)
}
