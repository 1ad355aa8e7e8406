use std::time::Instant;

use log::info;
use rand::Rng;

use super::rng;
use crate::{
    config::DiagnosticsConfig,
    error::Result,
    graphs::{network_graph::NetworkGraph, PointIndex},
    search::{
        dijkstra::{network_dijkstra, SearchLimits},
        dijkstra_data::DijkstraData,
    },
    store::GraphStore,
    utility::format_histogram,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidpointStats {
    pub iterations: usize,
    /// Per point index, the deepest position at which the point was seen in
    /// the middle of a shortest path tree.
    pub counts: Vec<u32>,
}

/// Adds one shortest path tree rooted at `start` to `counts`. A point on the
/// path to another point scores its distance in hops from that point, capped
/// by its own depth in the tree.
pub fn add_shortest_path_tree(
    graph: &NetworkGraph,
    start: PointIndex,
    max_depth: u32,
    data: &mut DijkstraData,
    counts: &mut [u32],
) {
    let limits = SearchLimits {
        max_hops: max_depth,
        ..SearchLimits::default()
    };
    network_dijkstra(graph, start, None, &limits, |_| false, data);

    for &point in data.settled() {
        if point == start {
            continue;
        }
        let mut k = 0;
        let mut current = data.entry(point).and_then(|entry| entry.predecessor);
        while let Some(parent) = current {
            if parent == start {
                break;
            }
            k += 1;
            let level = data.hops(parent).unwrap_or(0);
            if let Some(count) = counts.get_mut(parent as usize) {
                *count = (*count).max(k.min(level));
            }
            current = data.entry(parent).and_then(|entry| entry.predecessor);
        }
    }
}

/// Runs hop limited searches from random distinct start points and persists
/// the accumulated midpoint counts.
pub fn calculate_mid_points(
    config: &DiagnosticsConfig,
    store: &mut GraphStore,
) -> Result<MidpointStats> {
    let start = Instant::now();
    let graph = store.load_network_graph(false)?;
    let number_of_points = graph.number_of_points();
    info!(
        "Loaded {} points and {} segments",
        number_of_points,
        graph.number_of_edges()
    );

    let mut counts = vec![0u32; number_of_points];
    for (index, count) in store.load_midpoints()? {
        if let Some(slot) = counts.get_mut(index as usize) {
            *slot = count;
        }
    }
    let mut previous = counts.clone();

    let mut rng = rng(config);
    let mut data = DijkstraData::new();
    let mut started = vec![false; number_of_points];
    let iterations = config.iterations.min(number_of_points / 2);
    let mut remaining = iterations;
    while remaining > 0 {
        let start_point = rng.gen_range(0..number_of_points);
        if started[start_point] {
            continue;
        }
        started[start_point] = true;
        remaining -= 1;

        add_shortest_path_tree(
            &graph,
            start_point as PointIndex,
            config.max_depth as u32,
            &mut data,
            &mut counts,
        );

        let mut increased = 0;
        let mut max_increase = 0;
        let mut max_top = 0;
        for (&count, before) in counts.iter().zip(previous.iter_mut()) {
            if count > *before && *before < config.log_stat_threshold {
                increased += 1;
                max_increase = max_increase.max(count - *before);
                max_top = max_top.max(count);
            }
            *before = count;
        }
        info!(
            "{}. Routing {}: increased {} points - max diff {}, max top {} ({} settled)",
            remaining + 1,
            start_point,
            increased,
            max_increase,
            max_top,
            data.search_space_size()
        );

        if remaining % config.save_iterations.max(1) == 0 {
            save_counts(store, &counts, config.log_stat_max_depth)?;
        }
    }
    if iterations == 0 {
        save_counts(store, &counts, config.log_stat_max_depth)?;
    }

    info!(
        "Midpoints finished in {:.2} s after {} iterations",
        start.elapsed().as_secs_f64(),
        iterations
    );
    Ok(MidpointStats { iterations, counts })
}

fn save_counts(store: &mut GraphStore, counts: &[u32], max_depth: usize) -> Result<()> {
    let saving = Instant::now();
    let rows: Vec<(PointIndex, u32)> = counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(index, count)| (index as PointIndex, *count))
        .collect();
    store.save_midpoints(&rows)?;
    info!(
        "Depths: {} - saving {:.2} s",
        format_histogram(
            counts.iter().map(|&count| count as usize),
            1,
            max_depth
        ),
        saving.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::add_shortest_path_tree;
    use crate::{
        graphs::{edge::NetworkEdge, network_graph::NetworkGraph},
        search::dijkstra_data::DijkstraData,
    };

    #[test]
    fn inner_points_of_a_line_score_their_depth() {
        // 0 - 1 - 2 - 3 - 4, both directions
        let mut edges = Vec::new();
        for tail in 0..4 {
            edges.push(NetworkEdge::new(tail, tail + 1, 1.0, false).unwrap());
            edges.push(NetworkEdge::new(tail + 1, tail, 1.0, false).unwrap());
        }
        let graph = NetworkGraph::from_edges(5, &edges);
        let mut counts = vec![0; 5];
        add_shortest_path_tree(&graph, 0, 10, &mut DijkstraData::new(), &mut counts);

        assert_eq!(counts, vec![0, 1, 2, 1, 0]);
    }
}
