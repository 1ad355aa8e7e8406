//! Estimates a coarser level: clusters are merged with their neighbours,
//! points inside merged clusters drop out and the shortcut graph between the
//! remaining border points is sized.

use std::collections::{BTreeMap, BTreeSet};

use ahash::{HashMap, HashSet, HashSetExt};
use log::info;

use crate::{
    config::DiagnosticsConfig,
    error::Result,
    graphs::{network_graph::NetworkGraph, network_point::NetworkPoint, ClusterIndex, PointIndex},
    search::{
        dijkstra::{network_dijkstra, SearchLimits},
        dijkstra_data::DijkstraData,
    },
    store::GraphStore,
};

/// Below this many routes through an outside point its routes stay single
/// shortcuts.
const MIN_ROUTES_FOR_MIDPOINT: usize = 5;

#[derive(Clone, Debug, Default)]
pub struct ClusterNode {
    pub id: ClusterIndex,
    pub points: Vec<PointIndex>,
    /// Points that fell inside the cluster after merging.
    pub expoints: Vec<PointIndex>,
    pub neighbors: BTreeSet<usize>,
    merged_to: Option<usize>,
    merged: Vec<usize>,
}

impl ClusterNode {
    pub fn is_live(&self) -> bool {
        self.merged_to.is_none()
    }
}

/// Clusters restored from point membership, in cluster id order.
pub struct ClusterArena {
    pub clusters: Vec<ClusterNode>,
}

impl ClusterArena {
    pub fn restore(points: &[NetworkPoint]) -> ClusterArena {
        let mut by_id: BTreeMap<ClusterIndex, ClusterNode> = BTreeMap::new();
        for point in points {
            for &cluster in &point.clusters {
                by_id
                    .entry(cluster)
                    .or_insert_with(|| ClusterNode {
                        id: cluster,
                        ..ClusterNode::default()
                    })
                    .points
                    .push(point.index);
            }
        }
        let slots: HashMap<ClusterIndex, usize> = by_id
            .keys()
            .enumerate()
            .map(|(slot, id)| (*id, slot))
            .collect();
        let mut clusters: Vec<ClusterNode> = by_id.into_values().collect();
        for point in points {
            let members: Vec<usize> = point
                .clusters
                .iter()
                .filter_map(|id| slots.get(id).copied())
                .collect();
            for &a in &members {
                for &b in &members {
                    if a != b {
                        clusters[a].neighbors.insert(b);
                    }
                }
            }
        }
        ClusterArena { clusters }
    }

    pub fn merge_cluster(&self, cluster: usize) -> usize {
        let mut current = cluster;
        while let Some(next) = self.clusters[current].merged_to {
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Moves `cluster` and everything merged into it under `target`. A
    /// cluster without neighbours merges into itself.
    fn adopt_merge(&mut self, target: usize, cluster: usize) -> bool {
        if self.clusters[target].merged_to.is_some() || self.clusters[cluster].merged_to.is_some() {
            return false;
        }
        if target == cluster {
            if !self.clusters[cluster].neighbors.is_empty() {
                return false;
            }
            self.clusters[cluster].merged_to = Some(cluster);
            return true;
        }
        let merged = std::mem::take(&mut self.clusters[cluster].merged);
        for &inner in &merged {
            self.clusters[inner].merged_to = Some(target);
        }
        self.clusters[target].merged.extend(merged);
        self.clusters[target].merged.push(cluster);
        self.clusters[cluster].merged_to = Some(target);
        true
    }

    fn live_by_neighbors(&self) -> Vec<usize> {
        let mut live: Vec<usize> = (0..self.clusters.len())
            .filter(|&slot| self.clusters[slot].is_live())
            .collect();
        live.sort_by_key(|&slot| (self.clusters[slot].neighbors.len(), slot));
        live
    }

    /// Merges the less connected half of the live clusters into one of their
    /// neighbours.
    pub fn merge_half(&mut self) {
        let live = self.live_by_neighbors();
        let total_points: usize = live.iter().map(|&slot| self.clusters[slot].points.len()).sum();
        let total_clusters = live.len();

        let mut points = 0;
        let mut clusters = 0;
        for slot in live {
            if !self.clusters[slot].is_live() {
                continue;
            }
            points += self.clusters[slot].points.len();
            clusters += 1;
            if points >= total_points / 2 || clusters >= total_clusters / 2 {
                break;
            }
            if self.clusters[slot].neighbors.is_empty() {
                self.adopt_merge(slot, slot);
                continue;
            }
            let neighbors: Vec<usize> = self.clusters[slot].neighbors.iter().copied().collect();
            for neighbor in neighbors {
                let target = self.merge_cluster(neighbor);
                if target != slot && self.adopt_merge(target, slot) {
                    break;
                }
            }
        }
    }

    /// Reassigns points to merged clusters. A point left with one cluster is
    /// excluded and returned as an inner point of that cluster.
    pub fn recalculate_points(&mut self, points: &[NetworkPoint], excluded: &mut [bool]) {
        for cluster in &mut self.clusters {
            cluster.neighbors.clear();
            cluster.points.clear();
            cluster.expoints.clear();
        }
        let slots: HashMap<ClusterIndex, usize> = self
            .clusters
            .iter()
            .enumerate()
            .map(|(slot, cluster)| (cluster.id, slot))
            .collect();

        for point in points {
            if excluded[point.index as usize] {
                continue;
            }
            let owners: BTreeSet<usize> = point
                .clusters
                .iter()
                .filter_map(|id| slots.get(id))
                .map(|&slot| self.merge_cluster(slot))
                .collect();
            if owners.len() <= 1 {
                if let Some(&owner) = owners.iter().next() {
                    self.clusters[owner].expoints.push(point.index);
                }
                excluded[point.index as usize] = true;
                continue;
            }
            for &owner in &owners {
                self.clusters[owner].points.push(point.index);
                self.clusters[owner]
                    .neighbors
                    .extend(owners.iter().copied().filter(|&other| other != owner));
            }
        }
    }

    /// Logs live clusters grouped by neighbour count and returns their
    /// total number of border points.
    pub fn log_stats(&self) -> usize {
        let mut groups: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        let mut total_clusters = 0;
        let mut total_points = 0;
        for cluster in self.clusters.iter().filter(|cluster| cluster.is_live()) {
            let group = groups.entry(cluster.neighbors.len()).or_default();
            group.0 += 1;
            group.1 += cluster.points.len();
            total_clusters += 1;
            total_points += cluster.points.len();
        }
        for (neighbors, (clusters, points)) in groups {
            info!("Neighbors {} - {} islands ({} points)", neighbors, clusters, points);
        }
        info!("Total {} - {} points", total_clusters, total_points);
        total_points
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecondLevelStats {
    pub clusters_before: usize,
    pub clusters_after: usize,
    pub points_before: usize,
    pub points_after: usize,
    pub excluded_points: usize,
    pub cluster_shortcuts: usize,
    pub edges_plus: usize,
    pub edges_minus: usize,
    pub new_edges: usize,
}

/// Shortcuts the border points of one merged cluster would need. Routes that
/// run through a border point reuse its edges; outside points carrying many
/// routes split them into two halves.
pub fn calculate_edges_for_cluster(
    graph: &NetworkGraph,
    cluster: &ClusterNode,
    data: &mut DijkstraData,
) -> usize {
    let mut shortcuts: HashSet<(PointIndex, PointIndex)> = HashSet::new();
    let mut shortcut_mids: HashSet<(PointIndex, PointIndex)> = HashSet::new();
    let mut existing = 0;
    let mut through: BTreeMap<PointIndex, Vec<(PointIndex, PointIndex)>> = BTreeMap::new();

    for &from in &cluster.points {
        for &to in &cluster.points {
            if from == to {
                continue;
            }
            if graph.get_edge(from, to).is_some() {
                existing += 1;
                continue;
            }
            let found = network_dijkstra(graph, from, Some(to), &SearchLimits::default(), |_| false, data);
            let Some(path) = found.and_then(|_| data.get_path(to)) else {
                continue;
            };
            shortcuts.insert((from, to));
            for &inner in &path[1..path.len() - 1] {
                through.entry(inner).or_default().push((from, to));
            }
        }
    }

    let mut centers: Vec<(PointIndex, Vec<(PointIndex, PointIndex)>)> = through.into_iter().collect();
    centers.sort_by_key(|(point, routes)| (std::cmp::Reverse(routes.len()), *point));
    let members: HashSet<PointIndex> = cluster.points.iter().copied().collect();
    for (center, routes) in centers {
        if members.contains(&center) {
            for route in routes {
                if shortcuts.remove(&route) {
                    existing += 1;
                }
            }
            continue;
        }
        if routes.len() < MIN_ROUTES_FOR_MIDPOINT {
            continue;
        }
        for (from, to) in routes {
            if shortcuts.remove(&(from, to)) {
                shortcut_mids.insert((from, center));
                shortcut_mids.insert((center, to));
            }
        }
    }

    info!(
        "Cluster {}: new shortcuts {} (existing {})",
        cluster.id,
        shortcuts.len() + shortcut_mids.len(),
        existing
    );
    shortcuts.len() + shortcut_mids.len()
}

/// Edges gained and lost when the excluded points leave the graph: every
/// remaining point connects to the remaining points it reached through
/// excluded ones.
pub fn calculate_new_graph_size(graph: &NetworkGraph, excluded: &[bool]) -> (usize, usize) {
    let is_excluded = |point: PointIndex| excluded.get(point as usize).copied().unwrap_or(false);
    let mut plus = 0;
    let mut minus = 0;
    let mut stack = Vec::new();
    let mut visited = HashSet::new();
    for point in 0..graph.number_of_points() as PointIndex {
        if is_excluded(point) {
            minus += graph.out_edges(point).len();
            continue;
        }
        stack.clear();
        visited.clear();
        for edge in graph.out_edges(point) {
            if is_excluded(edge.head()) {
                stack.push(edge.head());
                minus += 1;
            }
        }
        while let Some(last) = stack.pop() {
            if !visited.insert(last) {
                continue;
            }
            for edge in graph.out_edges(last) {
                let head = edge.head();
                if is_excluded(head) {
                    stack.push(head);
                } else if head != point
                    && visited.insert(head)
                    && graph.get_edge(point, head).is_none()
                {
                    plus += 1;
                }
            }
        }
    }
    (plus, minus)
}

pub fn run_second_level_routing(
    config: &DiagnosticsConfig,
    store: &GraphStore,
) -> Result<SecondLevelStats> {
    let points = store.load_points()?;
    let graph = store.load_network_graph(false)?;
    let mut arena = ClusterArena::restore(&points);
    let mut excluded = vec![false; points.len()];
    let mut stats = SecondLevelStats {
        clusters_before: arena.clusters.len(),
        ..SecondLevelStats::default()
    };

    stats.points_before = arena.log_stats();
    stats.points_after = stats.points_before;
    for round in 0..config.merge_rounds {
        arena.merge_half();
        arena.recalculate_points(&points, &mut excluded);
        stats.points_after = arena.log_stats();
        info!("Round {} left {} border points", round + 1, stats.points_after);
        if stats.points_after * 500 < stats.points_before {
            break;
        }
    }
    stats.clusters_after = arena.clusters.iter().filter(|c| c.is_live()).count();
    stats.excluded_points = excluded.iter().filter(|&&e| e).count();

    let mut data = DijkstraData::new();
    for cluster in arena.clusters.iter().filter(|c| c.is_live()) {
        stats.cluster_shortcuts += calculate_edges_for_cluster(&graph, cluster, &mut data);
    }

    let (plus, minus) = calculate_new_graph_size(&graph, &excluded);
    stats.edges_plus = plus;
    stats.edges_minus = minus;
    stats.new_edges = (graph.number_of_edges() + plus).saturating_sub(minus);
    info!(
        "Points {} - {} = {}, shortcuts {} + {} - {} = {}",
        points.len(),
        stats.excluded_points,
        points.len() - stats.excluded_points,
        graph.number_of_edges(),
        plus,
        minus,
        stats.new_edges
    );
    info!("Cluster shortcuts {}", stats.cluster_shortcuts);
    Ok(stats)
}
