pub mod edge;
pub mod network_graph;
pub mod network_point;
pub mod road_edge;
pub mod segment;

/// Globally unique id of a road edge, see `road_edge::RoadEdgeIdentity`.
pub type PointId = i64;
/// Compact sequential index of a network point.
pub type PointIndex = u32;
pub type ClusterIndex = u32;
pub type RoadId = i64;
/// Meters.
pub type Distance = f64;
