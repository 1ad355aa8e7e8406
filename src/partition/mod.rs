//! Splits the road graph into small islands whose interior is hidden and
//! whose border segments become network points.

use ahash::{HashMap, HashMapExt};

use crate::{
    error::{Result, StructuralError},
    graphs::{ClusterIndex, PointId, PointIndex},
    source::RoadSegment,
};

pub mod collect;
pub mod island;

pub use island::NetworkPartitioner;

/// Who holds a visited point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
    /// An island of the cluster currently being built, by arena index.
    Island(usize),
    Cluster(ClusterIndex),
    /// Interior of an already processed region, by region id.
    Region(i64),
}

/// Interior ownership and network points known to the running partition.
#[derive(Default)]
pub struct FullNetwork {
    pub owners: HashMap<PointId, Owner>,
    pub network_points: HashMap<PointId, PointIndex>,
}

impl FullNetwork {
    pub fn new() -> FullNetwork {
        FullNetwork {
            owners: HashMap::new(),
            network_points: HashMap::new(),
        }
    }

    pub fn is_network_point(&self, point: PointId) -> bool {
        self.network_points.contains_key(&point)
    }

    pub fn is_interior(&self, point: PointId) -> bool {
        self.owners.contains_key(&point)
    }

    pub fn owner(&self, point: PointId) -> Option<Owner> {
        self.owners.get(&point).copied()
    }

    /// Marks the visited set of another region as taken.
    pub fn load_region(&mut self, region_id: i64, points: impl IntoIterator<Item = PointId>) {
        for point in points {
            self.owners.entry(point).or_insert(Owner::Region(region_id));
        }
    }

    /// Forgets interior points of earlier regions and clusters. Network
    /// points are kept.
    pub fn clear_interior(&mut self) {
        self.owners.clear();
    }

    pub(crate) fn freeze_cluster(
        &mut self,
        interior: &[PointId],
        island: usize,
        cluster: ClusterIndex,
    ) -> Result<()> {
        for point in interior {
            match self.owners.insert(*point, Owner::Cluster(cluster)) {
                Some(Owner::Island(owner)) if owner == island => {}
                _ => return Err(StructuralError::DuplicateInterior { point: *point }.into()),
            }
        }
        Ok(())
    }
}

/// A finished island. `border` holds the positive direction of every border
/// segment in id order.
#[derive(Clone, Debug)]
pub struct NetworkCluster {
    pub index: ClusterIndex,
    pub start: RoadSegment,
    pub interior: Vec<PointId>,
    pub border: Vec<RoadSegment>,
}

impl NetworkCluster {
    pub fn is_isolated(&self) -> bool {
        self.border.is_empty()
    }

    /// Pairwise shortcuts the border needs.
    pub fn estimated_shortcuts(&self) -> usize {
        let border = self.border.len();
        border * border.saturating_sub(1) / 2
    }
}
