use super::dijkstra_data::DijkstraData;
use crate::graphs::{network_graph::NetworkGraph, Distance, PointIndex};

/// Bounds of a network search. Unbounded by default.
#[derive(Clone, Copy, Debug)]
pub struct SearchLimits {
    pub max_distance: Distance,
    pub max_settled: usize,
    pub max_hops: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_distance: Distance::INFINITY,
            max_settled: usize::MAX,
            max_hops: u32::MAX,
        }
    }
}

/// Dijkstra over the network point graph. Points for which `excluded`
/// returns true are never entered. Returns the distance to `target` when it
/// was settled.
pub fn network_dijkstra(
    graph: &NetworkGraph,
    source: PointIndex,
    target: Option<PointIndex>,
    limits: &SearchLimits,
    excluded: impl Fn(PointIndex) -> bool,
    data: &mut DijkstraData,
) -> Option<Distance> {
    data.clear(source);

    while let Some(state) = data.pop() {
        let tail = state.key;
        if Some(tail) == target {
            return Some(state.distance);
        }
        if data.search_space_size() >= limits.max_settled {
            break;
        }
        let hops = data.hops(tail).unwrap_or(0);
        if hops >= limits.max_hops {
            continue;
        }

        for edge in graph.out_edges(tail) {
            let head = edge.head();
            if excluded(head) || state.distance + edge.distance() > limits.max_distance {
                continue;
            }
            data.update(tail, head, edge.distance());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::edge::NetworkEdge;

    fn line() -> NetworkGraph {
        // 0 -> 1 -> 2 -> 3
        let edges: Vec<NetworkEdge> = (0..3)
            .filter_map(|tail| NetworkEdge::new(tail, tail + 1, 2.0, false))
            .collect();
        NetworkGraph::from_edges(4, &edges)
    }

    #[test]
    fn hop_limit_stops_expansion() {
        let graph = line();
        let mut data = DijkstraData::new();
        let limits = SearchLimits {
            max_hops: 2,
            ..SearchLimits::default()
        };
        assert_eq!(network_dijkstra(&graph, 0, Some(3), &limits, |_| false, &mut data), None);
        assert_eq!(data.distance(2), Some(4.0));
        assert_eq!(data.distance(3), None);

        let found = network_dijkstra(&graph, 0, Some(3), &SearchLimits::default(), |_| false, &mut data);
        assert_eq!(found, Some(6.0));
        assert_eq!(data.get_path(3), Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn excluded_points_block_the_route() {
        let graph = line();
        let mut data = DijkstraData::new();
        let found = network_dijkstra(&graph, 0, Some(3), &SearchLimits::default(), |point| point == 1, &mut data);
        assert_eq!(found, None);
        assert_eq!(data.search_space_size(), 1);
    }
}
