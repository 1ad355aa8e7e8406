use serde_derive::{Deserialize, Serialize};

use super::{road_edge::RoadEdgeIdentity, ClusterIndex, PointId, PointIndex, RoadId};
use crate::geo::midpoint_31;

/// A persisted border point: one road segment exposed by at least one cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkPoint {
    pub id: PointId,
    pub index: PointIndex,
    pub road_id: RoadId,
    pub start: u32,
    pub end: u32,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub clusters: Vec<ClusterIndex>,
    pub ch_index: Option<u32>,
}

impl NetworkPoint {
    pub fn identity(&self) -> Option<RoadEdgeIdentity> {
        RoadEdgeIdentity::new(self.road_id, self.start, self.end)
    }

    pub fn midpoint(&self) -> (i32, i32) {
        midpoint_31(self.start_x, self.start_y, self.end_x, self.end_y)
    }
}
