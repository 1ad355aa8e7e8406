use ahash::HashSet;

use super::dijkstra_data::DijkstraData;
use crate::graphs::{network_graph::NetworkGraph, Distance, PointIndex};

/// Bounded search from `source` that never enters `without` or an excluded
/// point. Stops once every target is settled, the distance ceiling is passed
/// or `max_settled` points were settled. Distances of reached targets are
/// left in `data`. Returns the number of settled points.
#[allow(clippy::too_many_arguments)]
pub fn witness_search(
    graph: &NetworkGraph,
    source: PointIndex,
    without: PointIndex,
    excluded: &[bool],
    max_distance: Distance,
    max_settled: usize,
    targets: &HashSet<PointIndex>,
    data: &mut DijkstraData,
) -> usize {
    data.clear(source);
    if targets.is_empty() {
        return 0;
    }
    let mut remaining = targets.len();

    while let Some(state) = data.pop() {
        if targets.contains(&state.key) {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        if data.search_space_size() >= max_settled {
            break;
        }

        for edge in graph.out_edges(state.key) {
            let head = edge.head();
            let alternative_distance = state.distance + edge.distance();
            if head != without
                && !excluded.get(head as usize).copied().unwrap_or(false)
                && alternative_distance <= max_distance
            {
                data.update(state.key, head, edge.distance());
            }
        }
    }

    data.search_space_size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::edge::NetworkEdge;
    use ahash::HashSetExt;

    #[test]
    fn witness_avoids_the_contracted_point() {
        // 0 -> 1 -> 2 costs 2, the detour 0 -> 3 -> 2 costs 6
        let edges: Vec<NetworkEdge> = [(0, 1, 1.0), (1, 2, 1.0), (0, 3, 5.0), (3, 2, 1.0)]
            .into_iter()
            .filter_map(|(tail, head, distance)| NetworkEdge::new(tail, head, distance, false))
            .collect();
        let graph = NetworkGraph::from_edges(4, &edges);
        let mut targets = HashSet::new();
        targets.insert(2);
        let mut data = DijkstraData::new();

        witness_search(&graph, 0, 1, &[false; 4], 10.0, 10, &targets, &mut data);
        assert_eq!(data.distance(2), Some(6.0));

        witness_search(&graph, 0, 1, &[false; 4], 5.0, 10, &targets, &mut data);
        assert_eq!(data.distance(2), None);

        let excluded = [false, false, false, true];
        witness_search(&graph, 0, 1, &excluded, 10.0, 10, &targets, &mut data);
        assert_eq!(data.distance(3), None);
        assert_eq!(data.distance(2), None);
    }
}
