use serde_derive::{Deserialize, Serialize};

use super::{PointId, RoadId};

/// Bits of a point id reserved for the segment index and the direction.
pub const ROUTE_POINT_BITS: u32 = 11;
/// Segment indices must stay below this so they fit into the reserved bits.
pub const MAX_ROAD_POINTS: u32 = 1 << (ROUTE_POINT_BITS - 1);

/// One traversal of the segment `start -> end` of a road. The two directions
/// of the same segment are distinct identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoadEdgeIdentity {
    road_id: RoadId,
    start: u32,
    end: u32,
}

impl RoadEdgeIdentity {
    pub fn new(road_id: RoadId, start: u32, end: u32) -> Option<RoadEdgeIdentity> {
        if start.abs_diff(end) != 1 || start.max(end) >= MAX_ROAD_POINTS || road_id < 0 {
            return None;
        }
        Some(RoadEdgeIdentity {
            road_id,
            start,
            end,
        })
    }

    pub fn road_id(&self) -> RoadId {
        self.road_id
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn is_positive(&self) -> bool {
        self.end > self.start
    }

    pub fn reversed(&self) -> RoadEdgeIdentity {
        RoadEdgeIdentity {
            road_id: self.road_id,
            start: self.end,
            end: self.start,
        }
    }

    pub fn canonical(&self) -> RoadEdgeIdentity {
        if self.is_positive() {
            *self
        } else {
            self.reversed()
        }
    }

    /// Id of this traversal, direction included.
    pub fn directed_id(&self) -> PointId {
        (self.road_id << ROUTE_POINT_BITS)
            + ((self.start as PointId) << 1)
            + self.is_positive() as PointId
    }

    /// Id shared by both directions of the segment.
    pub fn point_id(&self) -> PointId {
        self.canonical().directed_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_share_point_id() {
        let forward = RoadEdgeIdentity::new(42, 3, 4).unwrap();
        let backward = forward.reversed();
        assert_ne!(forward.directed_id(), backward.directed_id());
        assert_eq!(forward.point_id(), backward.point_id());
        assert_eq!(forward.point_id(), (42 << 11) + (3 << 1) + 1);
        assert_eq!(backward.directed_id(), (42 << 11) + (4 << 1));
    }

    #[test]
    fn rejects_non_adjacent_indices() {
        assert!(RoadEdgeIdentity::new(1, 2, 4).is_none());
        assert!(RoadEdgeIdentity::new(1, 2, 2).is_none());
        assert!(RoadEdgeIdentity::new(1, MAX_ROAD_POINTS - 1, MAX_ROAD_POINTS).is_none());
    }
}
