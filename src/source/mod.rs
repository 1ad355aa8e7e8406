//! Access to the underlying road graph. The preparation phases only talk to
//! `RoadGraphSource`; `memory_graph` provides an implementation backed by
//! decoded road lists.

use ahash::{HashMap, HashMapExt, HashSet};
use serde_derive::{Deserialize, Serialize};

use crate::{
    error::Result,
    geo::distance_31,
    graphs::{road_edge::RoadEdgeIdentity, Distance, PointId},
};

pub mod memory_graph;

/// A directed traversal of one road segment together with its coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoadSegment {
    pub identity: RoadEdgeIdentity,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
}

impl RoadSegment {
    pub fn new(identity: RoadEdgeIdentity, start: (i32, i32), end: (i32, i32)) -> RoadSegment {
        RoadSegment {
            identity,
            start_x: start.0,
            start_y: start.1,
            end_x: end.0,
            end_y: end.1,
        }
    }

    pub fn point_id(&self) -> PointId {
        self.identity.point_id()
    }

    pub fn directed_id(&self) -> PointId {
        self.identity.directed_id()
    }

    pub fn start_point(&self) -> (i32, i32) {
        (self.start_x, self.start_y)
    }

    pub fn end_point(&self) -> (i32, i32) {
        (self.end_x, self.end_y)
    }

    pub fn length(&self) -> Distance {
        distance_31(self.start_x, self.start_y, self.end_x, self.end_y)
    }

    pub fn reversed(&self) -> RoadSegment {
        RoadSegment {
            identity: self.identity.reversed(),
            start_x: self.end_x,
            start_y: self.end_y,
            end_x: self.start_x,
            end_y: self.start_y,
        }
    }

    pub fn canonical(&self) -> RoadSegment {
        if self.identity.is_positive() {
            *self
        } else {
            self.reversed()
        }
    }
}

/// Spatial partition of the source, usually one map file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub name: String,
    pub filename: String,
    #[serde(default)]
    pub file_pointer: i64,
    #[serde(default)]
    pub size: i64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl RegionInfo {
    pub fn intersects(&self, other: &RegionInfo) -> bool {
        !(self.left > other.right
            || self.right < other.left
            || self.top < other.bottom
            || self.bottom > other.top)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrontierEntry {
    pub segment: RoadSegment,
    pub distance: Distance,
    /// Directed id of the traversal this one was reached from.
    pub parent: Option<PointId>,
}

/// Result of a road graph search: labels of every touched traversal keyed by
/// directed id, and the targets in the order they were reached.
#[derive(Clone, Debug, Default)]
pub struct SearchFrontier {
    entries: HashMap<PointId, FrontierEntry>,
    reached: Vec<PointId>,
    pub settled: usize,
}

impl SearchFrontier {
    pub fn new() -> SearchFrontier {
        SearchFrontier {
            entries: HashMap::new(),
            reached: Vec::new(),
            settled: 0,
        }
    }

    pub fn label(&mut self, entry: FrontierEntry) {
        self.entries.insert(entry.segment.directed_id(), entry);
    }

    pub fn mark_reached(&mut self, directed_id: PointId) {
        self.reached.push(directed_id);
    }

    pub fn entry(&self, directed_id: PointId) -> Option<&FrontierEntry> {
        self.entries.get(&directed_id)
    }

    /// Reached targets in non-decreasing distance order.
    pub fn reached(&self) -> impl Iterator<Item = &FrontierEntry> + '_ {
        self.reached.iter().filter_map(|id| self.entries.get(id))
    }

    /// Traversals from the search origin to `directed_id`, both included.
    pub fn path_to(&self, directed_id: PointId) -> Vec<&FrontierEntry> {
        let mut path = Vec::new();
        let mut current = self.entries.get(&directed_id);
        while let Some(entry) = current {
            path.push(entry);
            current = entry.parent.and_then(|parent| self.entries.get(&parent));
        }
        path.reverse();
        path
    }
}

/// The road graph as consumed by the preparation phases.
pub trait RoadGraphSource {
    fn regions(&self) -> Vec<RegionInfo>;

    /// Drops every cached road and reopens the source restricted to `files`,
    /// or to all files when `None`.
    fn reload(&mut self, files: Option<&[String]>) -> Result<()>;

    /// First segment of every road of the region in source order, positive
    /// direction.
    fn region_roads(&mut self, region: &RegionInfo) -> Result<Vec<RoadSegment>>;

    /// Segments touching the point, positive direction.
    fn segments_at(&mut self, x: i32, y: i32) -> Result<Vec<RoadSegment>>;

    fn find_segment(&mut self, identity: RoadEdgeIdentity) -> Result<Option<RoadSegment>>;

    fn nearest_segment(&mut self, x: i32, y: i32) -> Result<Option<RoadSegment>>;

    /// Shortest path search from both directions of `start`. Traversals whose
    /// directed id is in `targets` are recorded as reached and not expanded.
    fn search(&mut self, start: &RoadSegment, targets: &HashSet<PointId>)
        -> Result<SearchFrontier>;

    fn segment_distance(&self, segment: &RoadSegment) -> Distance {
        segment.length()
    }

    /// Number of road points currently held in caches.
    fn cached_points(&self) -> usize {
        0
    }
}
