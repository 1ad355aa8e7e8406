use std::collections::BTreeMap;

use super::{FullNetwork, NetworkCluster, Owner};
use crate::{
    config::PartitionConfig,
    error::{Result, StructuralError},
    graphs::{ClusterIndex, Distance, PointId},
    search::queue::{DijkstraQueueElement, HeapQueue},
    source::{RoadGraphSource, RoadSegment},
};

#[derive(Clone, Copy, Debug)]
struct QueuedSegment {
    segment: RoadSegment,
    /// Distance from the seed of the top island to the start of the segment.
    distance: Distance,
}

struct Island {
    parent: Option<usize>,
    depth: usize,
    queue: HeapQueue<PointId>,
    visited: Vec<PointId>,
    to_visit: BTreeMap<PointId, QueuedSegment>,
}

/// Builds clusters by growing islands around seed segments. Nested islands
/// live in an arena and point to their parent by index; visited points are
/// recorded in the shared ownership map of `FullNetwork`.
pub struct NetworkPartitioner<'a> {
    config: &'a PartitionConfig,
    islands: Vec<Island>,
}

struct IslandContext<'a, 'b> {
    config: &'a PartitionConfig,
    islands: &'a mut Vec<Island>,
    network: &'a mut FullNetwork,
    source: &'a mut (dyn RoadGraphSource + 'b),
}

impl<'a> NetworkPartitioner<'a> {
    pub fn new(config: &'a PartitionConfig) -> NetworkPartitioner<'a> {
        NetworkPartitioner {
            config,
            islands: Vec::new(),
        }
    }

    /// Grows the cluster around `seed` and hands its interior over to
    /// `cluster` in the ownership map.
    pub fn build_cluster(
        &mut self,
        network: &mut FullNetwork,
        source: &mut dyn RoadGraphSource,
        seed: RoadSegment,
        cluster: ClusterIndex,
    ) -> Result<NetworkCluster> {
        self.islands.clear();
        let seed = seed.canonical();
        let mut context = IslandContext {
            config: self.config,
            islands: &mut self.islands,
            network,
            source,
        };
        let root = context.new_island(
            None,
            QueuedSegment {
                segment: seed,
                distance: 0.0,
            },
        );
        let built = context.build_island(root);
        let island = self.islands.pop();
        if let Err(error) = built {
            if let Some(island) = &island {
                for point in &island.visited {
                    network.owners.remove(point);
                }
            }
            return Err(error);
        }
        let Some(island) = island else {
            return Err(StructuralError::MissingEdge {
                point: seed.point_id(),
            }
            .into());
        };

        network.freeze_cluster(&island.visited, root, cluster)?;
        Ok(NetworkCluster {
            index: cluster,
            start: seed,
            interior: island.visited,
            border: island
                .to_visit
                .into_values()
                .map(|queued| queued.segment)
                .collect(),
        })
    }
}

fn coeff_to_minimize(internal_segments: usize, boundary_points: f64) -> f64 {
    boundary_points * (boundary_points - 1.0) / 2.0 / internal_segments as f64
}

impl<'a, 'b> IslandContext<'a, 'b> {
    fn new_island(&mut self, parent: Option<usize>, start: QueuedSegment) -> usize {
        let depth = parent.map_or(1, |parent| self.islands[parent].depth + 1);
        let id = start.segment.point_id();
        let mut queue = HeapQueue::new();
        queue.push(DijkstraQueueElement::new(start.distance, id));
        let mut to_visit = BTreeMap::new();
        to_visit.insert(id, start);
        self.islands.push(Island {
            parent,
            depth,
            queue,
            visited: Vec::new(),
            to_visit,
        });
        self.islands.len() - 1
    }

    fn ancestors(&self, island: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(island), |current| self.islands[*current].parent)
    }

    /// Interior of this island, of an ancestor, of a finished cluster or of
    /// a loaded region.
    fn is_visited(&self, island: usize, point: PointId) -> bool {
        match self.network.owner(point) {
            Some(Owner::Island(owner)) => self.ancestors(island).any(|id| id == owner),
            Some(_) => true,
            None => false,
        }
    }

    fn is_possible_network_point(&self, island: usize, point: PointId) -> bool {
        self.ancestors(island)
            .any(|id| self.islands[id].to_visit.contains_key(&point))
            || self.network.is_network_point(point)
    }

    fn visited_size(&self, island: usize) -> usize {
        self.ancestors(island)
            .map(|id| self.islands[id].visited.len())
            .sum()
    }

    fn build_island(&mut self, island: usize) -> Result<()> {
        let depth = self.islands[island].depth;
        let limit = self.config.max_vert_depth_lookup[depth - 1];
        while self.islands[island].to_visit.len() < limit {
            let Some(next) = self.islands[island].queue.pop() else {
                break;
            };
            let Some(segment) = self.islands[island].to_visit.get(&next.key).copied() else {
                continue;
            };
            if !self.proceed(island, segment, true)? {
                break;
            }
        }

        self.merge_straights(island)?;
        if depth < self.config.max_vert_depth_lookup.len() {
            self.merge_connected(island)?;
            self.merge_straights(island)?;
        }
        Ok(())
    }

    /// Moves a frontier segment into the interior and queues its neighbours.
    /// Network points stay on the frontier.
    fn proceed(&mut self, island: usize, segment: QueuedSegment, use_queue: bool) -> Result<bool> {
        if segment.distance > self.config.max_radius_island {
            return Ok(false);
        }
        let point = segment.segment.point_id();
        if self.network.is_network_point(point) {
            return Ok(true);
        }
        self.islands[island].to_visit.remove(&point);
        if self.is_visited(island, point) {
            return Err(StructuralError::InconsistentVisit { point }.into());
        }
        self.network.owners.insert(point, Owner::Island(island));
        self.islands[island].visited.push(point);

        let distance = segment.distance + self.source.segment_distance(&segment.segment);
        let road = segment.segment;
        self.add_neighbours(island, road.end_point(), distance, use_queue)?;
        self.add_neighbours(island, road.start_point(), distance, use_queue)?;
        Ok(true)
    }

    fn add_neighbours(
        &mut self,
        island: usize,
        (x, y): (i32, i32),
        distance: Distance,
        use_queue: bool,
    ) -> Result<()> {
        for next in self.source.segments_at(x, y)? {
            let next = next.canonical();
            let point = next.point_id();
            if self.is_visited(island, point) || self.islands[island].to_visit.contains_key(&point) {
                continue;
            }
            let current = &mut self.islands[island];
            if use_queue {
                current.queue.push(DijkstraQueueElement::new(distance, point));
            }
            current.to_visit.insert(
                point,
                QueuedSegment {
                    segment: next,
                    distance,
                },
            );
        }
        Ok(())
    }

    /// Absorbs frontier segments that only continue a straight line, so a
    /// road without junctions does not end up as a border point.
    fn merge_straights(&mut self, island: usize) -> Result<()> {
        let mut found = true;
        while found {
            let size = self.islands[island].to_visit.len();
            if size == 0 || size >= self.config.max_neighbors_points {
                break;
            }
            found = false;
            let candidates: Vec<QueuedSegment> =
                self.islands[island].to_visit.values().copied().collect();
            for candidate in candidates {
                if self.network.is_network_point(candidate.segment.point_id()) {
                    continue;
                }
                if self.count_non_visited(island, &candidate.segment)? <= 1
                    && self.proceed(island, candidate, false)?
                {
                    found = true;
                    break;
                }
            }
        }
        Ok(())
    }

    fn count_non_visited(&mut self, island: usize, segment: &RoadSegment) -> Result<usize> {
        let mut count = 0;
        for (x, y) in [segment.end_point(), segment.start_point()] {
            for next in self.source.segments_at(x, y)? {
                let point = next.point_id();
                if !self.is_visited(island, point) && !self.is_possible_network_point(island, point) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Tries to grow a child island from every frontier segment and keeps it
    /// when the border shrinks or the shortcut estimate per interior segment
    /// improves.
    fn merge_connected(&mut self, island: usize) -> Result<()> {
        let candidates: Vec<QueuedSegment> =
            self.islands[island].to_visit.values().copied().collect();
        for candidate in candidates {
            if self.islands[island].to_visit.len() >= self.config.max_neighbors_points {
                break;
            }
            let point = candidate.segment.point_id();
            if !self.islands[island].to_visit.contains_key(&point) {
                continue;
            }
            let parent_to_visit = self.islands[island].to_visit.len();
            let child = self.new_island(Some(island), candidate);
            if let Err(error) = self.build_island(child) {
                self.discard(child);
                return Err(error);
            }

            let parent = &self.islands[island];
            let built = &self.islands[child];
            let mut inc_points_after_merge: i64 = 0;
            for visited in &built.visited {
                if parent.to_visit.contains_key(visited) {
                    inc_points_after_merge -= 1;
                }
            }
            for frontier in built.to_visit.keys() {
                if !parent.to_visit.contains_key(frontier) {
                    inc_points_after_merge += 1;
                }
            }

            let merge = inc_points_after_merge <= 2
                || coeff_to_minimize(self.visited_size(island), parent_to_visit as f64)
                    > coeff_to_minimize(
                        self.visited_size(child),
                        parent_to_visit as f64 + inc_points_after_merge as f64,
                    );
            if merge {
                self.merge_child(island, child);
            } else {
                self.discard(child);
            }
        }
        Ok(())
    }

    fn merge_child(&mut self, island: usize, child: usize) {
        let Some(built) = self.islands.pop() else {
            return;
        };
        debug_assert_eq!(self.islands.len(), child);
        for point in &built.visited {
            self.network.owners.insert(*point, Owner::Island(island));
            self.islands[island].to_visit.remove(point);
        }
        self.islands[island].visited.extend(built.visited);
        for (point, segment) in built.to_visit {
            if self.network.owner(point) != Some(Owner::Island(island)) {
                self.islands[island].to_visit.insert(point, segment);
            }
        }
    }

    fn discard(&mut self, child: usize) {
        while self.islands.len() > child {
            if let Some(built) = self.islands.pop() {
                for point in &built.visited {
                    self.network.owners.remove(point);
                }
            }
        }
    }
}
