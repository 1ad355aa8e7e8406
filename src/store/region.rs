use ahash::{HashSet, HashSetExt};

use super::GraphStore;
use crate::{error::Result, graphs::PointId, source::RegionInfo};

/// Region bookkeeping of the partition phase. The visited set of a finished
/// region lives in the store and is only held in memory while a neighbouring
/// region is processed.
#[derive(Clone, Debug)]
pub struct RoutingRegion {
    pub id: i64,
    pub info: RegionInfo,
    pub processed: bool,
    visited: Option<HashSet<PointId>>,
    visited_count: usize,
}

impl RoutingRegion {
    pub fn new(id: i64, info: RegionInfo, processed: bool) -> RoutingRegion {
        RoutingRegion {
            id,
            info,
            processed,
            visited: None,
            visited_count: 0,
        }
    }

    pub fn intersects(&self, other: &RoutingRegion) -> bool {
        self.info.intersects(&other.info)
    }

    pub fn visited_count(&self) -> usize {
        self.visited
            .as_ref()
            .map_or(self.visited_count, HashSet::len)
    }

    pub fn is_loaded(&self) -> bool {
        self.visited.is_some()
    }

    pub fn start_processing(&mut self) {
        self.visited = Some(HashSet::new());
    }

    pub fn add_visited(&mut self, points: impl IntoIterator<Item = PointId>) {
        self.visited.get_or_insert_with(HashSet::new).extend(points);
    }

    pub fn visited(&self) -> Option<&HashSet<PointId>> {
        self.visited.as_ref()
    }

    /// Releases the in-memory set. Only valid once the set is persisted.
    pub fn unload(&mut self) {
        if let Some(visited) = self.visited.take() {
            self.visited_count = visited.len();
        }
    }

    pub fn load_visited(&mut self, store: &GraphStore) -> Result<&HashSet<PointId>> {
        if self.visited.is_none() {
            let points: HashSet<PointId> = store.load_region_points(self.id)?.into_iter().collect();
            self.visited_count = points.len();
            self.visited = Some(points);
        }
        Ok(self.visited.get_or_insert_with(HashSet::new))
    }
}
