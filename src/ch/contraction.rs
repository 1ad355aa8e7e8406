use std::{collections::BinaryHeap, time::Instant};

use ahash::{HashMap, HashMapExt, HashSet};
use log::{debug, info};

use super::{
    priority::ChPriorityElement,
    stats::{degree_histogram, ContractionStats},
};
use crate::{
    config::ContractionConfig,
    error::{Result, StructuralError},
    graphs::{
        edge::NetworkEdge,
        network_graph::NetworkGraph,
        network_point::NetworkPoint,
        segment::{NetworkSegment, ShortcutInfo},
        Distance, PointIndex,
    },
    search::{dijkstra_data::DijkstraData, witness::witness_search},
    store::GraphStore,
    utility::get_progressbar_long_jobs,
};

const DISTANCE_EPSILON: Distance = 1e-6;

/// A shortcut `tail -> head` through the point being contracted.
#[derive(Clone, Debug, PartialEq)]
pub struct ShortcutCandidate {
    pub tail: PointIndex,
    pub head: PointIndex,
    pub distance: Distance,
    /// Points settled by the witness search that failed to replace it.
    pub witnesses: u32,
}

/// Contracts network points in edge difference order. Contracted points keep
/// their edges but are excluded from every later search.
pub struct ContractionHierarchyBuilder<'a> {
    config: &'a ContractionConfig,
    graph: NetworkGraph,
    excluded: Vec<bool>,
    ranks: Vec<Option<u32>>,
    shortcuts: HashMap<(PointIndex, PointIndex), ShortcutInfo>,
    data: DijkstraData,
    stats: ContractionStats,
}

impl<'a> ContractionHierarchyBuilder<'a> {
    pub fn new(config: &'a ContractionConfig, graph: NetworkGraph) -> Self {
        let number_of_points = graph.number_of_points();
        Self {
            config,
            graph,
            excluded: vec![false; number_of_points],
            ranks: vec![None; number_of_points],
            shortcuts: HashMap::new(),
            data: DijkstraData::new(),
            stats: ContractionStats {
                points: number_of_points,
                ..ContractionStats::default()
            },
        }
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn ranks(&self) -> &[Option<u32>] {
        &self.ranks
    }

    pub fn is_excluded(&self, point: PointIndex) -> bool {
        self.excluded.get(point as usize).copied().unwrap_or(false)
    }

    pub fn stats(&self) -> &ContractionStats {
        &self.stats
    }

    /// Shortcuts that are still part of the graph with their chains.
    pub fn shortcuts(&self) -> Vec<(NetworkEdge, ShortcutInfo)> {
        let mut shortcuts: Vec<_> = self
            .shortcuts
            .iter()
            .filter_map(|(&(tail, head), info)| {
                let edge = self.graph.get_edge(tail, head)?;
                edge.is_shortcut().then(|| (edge, info.clone()))
            })
            .collect();
        shortcuts.sort_by_key(|(edge, _)| (edge.tail(), edge.head()));
        shortcuts
    }

    /// Shortcuts the contraction of `point` would need right now.
    pub fn required_shortcuts(&mut self, point: PointIndex) -> Vec<ShortcutCandidate> {
        let (in_edges, out_edges) = self.active_edges(point);
        self.required_shortcuts_between(point, &in_edges, &out_edges)
    }

    /// Shortcuts needed minus edges removed. A point without active
    /// neighbours has priority 0.
    pub fn edge_difference(&mut self, point: PointIndex) -> i32 {
        let (in_edges, out_edges) = self.active_edges(point);
        let shortcuts = self.required_shortcuts_between(point, &in_edges, &out_edges);
        shortcuts.len() as i32 - in_edges.len() as i32 - out_edges.len() as i32
    }

    fn active_edges(&self, point: PointIndex) -> (Vec<NetworkEdge>, Vec<NetworkEdge>) {
        let in_edges = self
            .graph
            .in_edges(point)
            .filter(|edge| !self.is_excluded(edge.tail()))
            .collect();
        let out_edges = self
            .graph
            .out_edges(point)
            .filter(|edge| !self.is_excluded(edge.head()))
            .collect();
        (in_edges, out_edges)
    }

    fn required_shortcuts_between(
        &mut self,
        point: PointIndex,
        in_edges: &[NetworkEdge],
        out_edges: &[NetworkEdge],
    ) -> Vec<ShortcutCandidate> {
        let mut shortcuts = Vec::new();
        let Some(max_out_distance) = out_edges
            .iter()
            .map(NetworkEdge::distance)
            .max_by(|a, b| a.total_cmp(b))
        else {
            return shortcuts;
        };

        for in_edge in in_edges {
            let tail = in_edge.tail();
            let targets: HashSet<PointIndex> = out_edges
                .iter()
                .map(NetworkEdge::head)
                .filter(|&head| head != tail)
                .collect();
            if targets.is_empty() {
                continue;
            }

            let settled = witness_search(
                &self.graph,
                tail,
                point,
                &self.excluded,
                in_edge.distance() + max_out_distance,
                self.config.max_witness_depth,
                &targets,
                &mut self.data,
            );
            self.stats.witness_searches += 1;
            self.stats.settled += settled;

            for out_edge in out_edges {
                let head = out_edge.head();
                if head == tail {
                    continue;
                }
                let distance = in_edge.distance() + out_edge.distance();
                let witness = self.data.distance(head).unwrap_or(Distance::INFINITY);
                if witness >= distance {
                    shortcuts.push(ShortcutCandidate {
                        tail,
                        head,
                        distance,
                        witnesses: settled as u32,
                    });
                }
            }
        }

        shortcuts
    }

    /// Full sequence of points behind the edge `tail -> head`.
    fn chain(&self, tail: PointIndex, head: PointIndex) -> Vec<PointIndex> {
        match self.shortcuts.get(&(tail, head)) {
            Some(info) => info.chain.clone(),
            None => vec![tail, head],
        }
    }

    /// Inserts the shortcuts around `point`, then excludes it with the next
    /// rank. Both directions of a pair are separate candidates.
    pub fn contract_point(
        &mut self,
        point: PointIndex,
        shortcuts: Vec<ShortcutCandidate>,
    ) -> Result<()> {
        for shortcut in shortcuts {
            let (tail, head) = (shortcut.tail, shortcut.head);
            let expected = match (self.graph.get_edge(tail, point), self.graph.get_edge(point, head)) {
                (Some(in_edge), Some(out_edge)) => in_edge.distance() + out_edge.distance(),
                _ => {
                    return Err(StructuralError::MissingEdge {
                        point: point as i64,
                    }
                    .into())
                }
            };
            if shortcut.distance + DISTANCE_EPSILON < expected {
                return Err(StructuralError::ShortcutTooCheap {
                    from: tail,
                    to: head,
                    distance: shortcut.distance,
                    expected,
                }
                .into());
            }

            let edge = NetworkEdge::new(tail, head, shortcut.distance, true).ok_or(
                StructuralError::NonPositiveDistance {
                    from: tail,
                    to: head,
                    distance: shortcut.distance,
                },
            )?;

            match self.graph.get_edge(tail, head) {
                Some(existing) if existing.distance() <= shortcut.distance => {
                    self.stats.skipped += 1;
                    continue;
                }
                Some(existing) if !existing.is_shortcut() => {
                    // The direct segment stays in the store, the shortcut
                    // takes its place in the graph.
                    debug!(
                        "Triangle inequality violated: direct {} -> {} ({}) is longer than {} via {}",
                        tail,
                        head,
                        existing.distance(),
                        shortcut.distance,
                        point
                    );
                    self.stats.triangle_violations += 1;
                    self.stats.added += 1;
                }
                Some(_) => self.stats.replaced += 1,
                None => self.stats.added += 1,
            }

            let mut chain = self.chain(tail, point);
            chain.extend(self.chain(point, head).into_iter().skip(1));
            self.graph.set_edge(&edge);
            self.shortcuts.insert(
                (tail, head),
                ShortcutInfo {
                    chain,
                    witnesses: shortcut.witnesses,
                },
            );
        }

        self.excluded[point as usize] = true;
        self.ranks[point as usize] = Some(self.stats.contracted as u32);
        self.stats.contracted += 1;
        Ok(())
    }

    /// Contracts until the configured share of points is reached or the
    /// queue runs dry. Returns the number of contracted points.
    pub fn run(&mut self) -> Result<usize> {
        let number_of_points = self.graph.number_of_points();
        let stop_at = (number_of_points as f64 * self.config.contract_percent).ceil() as usize;
        info!(
            "Contracting {} of {} points, witness depth {}",
            stop_at, number_of_points, self.config.max_witness_depth
        );

        let mut queue = BinaryHeap::with_capacity(number_of_points);
        for point in 0..number_of_points as PointIndex {
            let priority = self.edge_difference(point);
            queue.push(ChPriorityElement::new(priority, point));
        }
        info!("Initial degrees: {}", degree_histogram(&self.graph, &self.excluded));

        let bar = get_progressbar_long_jobs("Contraction", stop_at as u64);
        let start = Instant::now();
        while let Some(mut state) = queue.pop() {
            if self.stats.contracted >= stop_at {
                break;
            }
            if self.is_excluded(state.point) {
                continue;
            }

            let (in_edges, out_edges) = self.active_edges(state.point);
            let shortcuts = self.required_shortcuts_between(state.point, &in_edges, &out_edges);
            let priority =
                shortcuts.len() as i32 - in_edges.len() as i32 - out_edges.len() as i32;
            if priority > state.priority {
                state.priority = priority;
                queue.push(state);
                self.stats.reindexed += 1;
                continue;
            }

            self.contract_point(state.point, shortcuts)?;
            bar.inc(1);

            let contracted = self.stats.contracted;
            if contracted % self.config.log_every.max(1) == 0 {
                info!(
                    "Contracted {} points, {} shortcuts, {} reindexed, {:.1} s",
                    contracted,
                    self.stats.added,
                    self.stats.reindexed,
                    start.elapsed().as_secs_f64()
                );
            }
            if contracted % self.config.degree_every.max(1) == 0 {
                info!("Degrees: {}", degree_histogram(&self.graph, &self.excluded));
            }
        }
        bar.finish_and_clear();

        info!("Final degrees: {}", degree_histogram(&self.graph, &self.excluded));
        self.stats.log();
        Ok(self.stats.contracted)
    }
}

/// Contraction phase: rebuilds the point graph from the direct segments,
/// contracts it and replaces all shortcut segments and ranks in the store.
pub fn run_contraction_hierarchy(
    config: &ContractionConfig,
    store: &mut GraphStore,
) -> Result<ContractionStats> {
    let points = store.load_points()?;
    let graph = store.load_network_graph(false)?;
    info!(
        "Loaded {} points and {} segments",
        points.len(),
        graph.number_of_edges()
    );

    let mut builder = ContractionHierarchyBuilder::new(config, graph);
    builder.run()?;

    let shortcuts = shortcut_segments(store, &points, builder.shortcuts())?;
    info!("Saving {} shortcuts", shortcuts.len());
    store.replace_shortcuts(&shortcuts, builder.ranks())?;
    Ok(builder.stats().clone())
}

/// Geometry of a shortcut: the geometries of the direct segments along its
/// chain, concatenated.
fn shortcut_segments(
    store: &GraphStore,
    points: &[NetworkPoint],
    shortcuts: Vec<(NetworkEdge, ShortcutInfo)>,
) -> Result<Vec<NetworkSegment>> {
    let mut segments = Vec::with_capacity(shortcuts.len());
    for (edge, info) in shortcuts {
        let mut geometry = Vec::new();
        for pair in info.chain.windows(2) {
            let part = store.load_geometry(pair[0], pair[1], false)?.ok_or_else(|| {
                StructuralError::MissingEdge {
                    point: points.get(pair[0] as usize).map_or(pair[0] as i64, |p| p.id),
                }
            })?;
            geometry.extend(part);
        }
        segments.push(NetworkSegment {
            start: edge.tail(),
            end: edge.head(),
            distance: edge.distance(),
            geometry,
            shortcut: Some(info),
        });
    }
    Ok(segments)
}
