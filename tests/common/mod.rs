#![allow(dead_code)]

use hh_network::{
    config::PrepConfig,
    geo::{get_31_latitude_y, get_31_longitude_x},
    graphs::{
        edge::NetworkEdge, network_graph::NetworkGraph, road_edge::RoadEdgeIdentity, Distance,
        PointId, PointIndex, RoadId,
    },
    partition::{FullNetwork, NetworkCluster, NetworkPartitioner},
    search::{
        dijkstra::{network_dijkstra, SearchLimits},
        dijkstra_data::DijkstraData,
    },
    source::{
        memory_graph::{InMemoryRoadGraph, RegionData, Road, RoadGraphData},
        RegionInfo, RoadGraphSource, RoadSegment,
    },
};

pub const BASE: i32 = 1 << 30;
/// Roughly 190 m on the 31-bit grid near the equator.
pub const STEP: i32 = 10_000;
/// Large enough to need several clusters under `test_config`.
pub const GRID: i32 = 10;

pub fn road(id: RoadId, points: Vec<(i32, i32)>) -> Road {
    Road {
        id,
        points,
        oneway: 0,
    }
}

pub fn region(name: &str, roads: Vec<Road>) -> RegionData {
    let xs = roads.iter().flat_map(|road| road.points.iter().map(|p| p.0));
    let ys = roads.iter().flat_map(|road| road.points.iter().map(|p| p.1));
    let (min_x, max_x) = (xs.clone().min().unwrap(), xs.max().unwrap());
    let (min_y, max_y) = (ys.clone().min().unwrap(), ys.max().unwrap());
    RegionData {
        info: RegionInfo {
            name: name.to_string(),
            filename: format!("{}.json", name),
            file_pointer: 0,
            size: 0,
            left: get_31_longitude_x(min_x),
            right: get_31_longitude_x(max_x),
            top: get_31_latitude_y(min_y),
            bottom: get_31_latitude_y(max_y),
        },
        roads,
    }
}

/// `n` horizontal and `n` vertical roads crossing at every grid point.
pub fn grid_roads(first_id: RoadId, origin: (i32, i32), n: i32) -> Vec<Road> {
    let mut roads = Vec::new();
    for row in 0..n {
        let points = (0..n)
            .map(|column| (origin.0 + column * STEP, origin.1 + row * STEP))
            .collect();
        roads.push(road(first_id + row as RoadId, points));
    }
    for column in 0..n {
        let points = (0..n)
            .map(|row| (origin.0 + column * STEP, origin.1 + row * STEP))
            .collect();
        roads.push(road(first_id + (n + column) as RoadId, points));
    }
    roads
}

pub fn grid_source(n: i32) -> InMemoryRoadGraph {
    InMemoryRoadGraph::new(RoadGraphData {
        regions: vec![region("grid", grid_roads(1, (BASE, BASE), n))],
    })
}

/// A grid plus a road far away that touches nothing else.
pub fn grid_with_pocket_source(n: i32) -> InMemoryRoadGraph {
    let mut roads = grid_roads(1, (BASE, BASE), n);
    let far = BASE + 100 * STEP;
    roads.push(road(
        900,
        vec![(far, far), (far + STEP, far), (far + 2 * STEP, far)],
    ));
    InMemoryRoadGraph::new(RoadGraphData {
        regions: vec![region("grid", roads)],
    })
}

pub fn test_config() -> PrepConfig {
    let mut config = PrepConfig::default();
    config.partition.max_vert_depth_lookup = vec![6, 4, 3];
    config.partition.max_neighbors_points = 12;
    config.store.batch_size = 1;
    config
}

/// Road segment behind a positive point id.
pub fn segment_of(source: &mut dyn RoadGraphSource, id: PointId) -> RoadSegment {
    let start = ((id & 0x7ff) >> 1) as u32;
    let identity = RoadEdgeIdentity::new(id >> 11, start, start + 1).unwrap();
    assert_eq!(identity.point_id(), id);
    source.find_segment(identity).unwrap().unwrap()
}

/// Builds clusters for every seed the way the partition phase does, without
/// a store.
pub fn build_all_clusters(
    config: &PrepConfig,
    source: &mut InMemoryRoadGraph,
) -> Vec<NetworkCluster> {
    let mut network = FullNetwork::new();
    let mut partitioner = NetworkPartitioner::new(&config.partition);
    let mut clusters = Vec::new();
    for region in source.regions() {
        for seed in source.region_roads(&region).unwrap() {
            let point = seed.point_id();
            if network.is_interior(point) || network.is_network_point(point) {
                continue;
            }
            let cluster = partitioner
                .build_cluster(&mut network, source, seed, clusters.len() as u32)
                .unwrap();
            for border in &cluster.border {
                let next = network.network_points.len() as PointIndex;
                network
                    .network_points
                    .entry(border.point_id())
                    .or_insert(next);
            }
            clusters.push(cluster);
        }
    }
    clusters
}

pub fn add_edge_bidirectional(
    edges: &mut Vec<NetworkEdge>,
    tail: PointIndex,
    head: PointIndex,
    distance: Distance,
) {
    edges.push(NetworkEdge::new(tail, head, distance, false).unwrap());
    edges.push(NetworkEdge::new(head, tail, distance, false).unwrap());
}

pub fn get_small_graph() -> NetworkGraph {
    // https://jlazarsfeld.github.io/ch.150.project/img/contraction/contract-full-1.png
    let mut edges = Vec::new();
    add_edge_bidirectional(&mut edges, 0, 1, 3.0);
    add_edge_bidirectional(&mut edges, 0, 2, 5.0);
    add_edge_bidirectional(&mut edges, 0, 10, 3.0);
    add_edge_bidirectional(&mut edges, 1, 2, 3.0);
    add_edge_bidirectional(&mut edges, 1, 3, 5.0);
    add_edge_bidirectional(&mut edges, 2, 3, 2.0);
    add_edge_bidirectional(&mut edges, 2, 9, 2.0);
    add_edge_bidirectional(&mut edges, 3, 4, 7.0);
    add_edge_bidirectional(&mut edges, 3, 9, 4.0);
    add_edge_bidirectional(&mut edges, 4, 5, 6.0);
    add_edge_bidirectional(&mut edges, 4, 9, 3.0);
    add_edge_bidirectional(&mut edges, 5, 6, 4.0);
    add_edge_bidirectional(&mut edges, 5, 7, 2.0);
    add_edge_bidirectional(&mut edges, 6, 7, 3.0);
    add_edge_bidirectional(&mut edges, 6, 8, 5.0);
    add_edge_bidirectional(&mut edges, 7, 8, 3.0);
    add_edge_bidirectional(&mut edges, 7, 9, 2.0);
    add_edge_bidirectional(&mut edges, 8, 9, 4.0);
    add_edge_bidirectional(&mut edges, 8, 10, 6.0);
    add_edge_bidirectional(&mut edges, 9, 10, 3.0);
    NetworkGraph::from_edges(11, &edges)
}

/// A-B-C-D-E-F in a line with cost 10 and G hanging off C with cost 5.
/// D gets index 0, then A, B, C, E, F, G.
pub fn get_line_graph() -> NetworkGraph {
    const D: PointIndex = 0;
    const A: PointIndex = 1;
    const B: PointIndex = 2;
    const C: PointIndex = 3;
    const E: PointIndex = 4;
    const F: PointIndex = 5;
    const G: PointIndex = 6;
    let mut edges = Vec::new();
    add_edge_bidirectional(&mut edges, A, B, 10.0);
    add_edge_bidirectional(&mut edges, B, C, 10.0);
    add_edge_bidirectional(&mut edges, C, D, 10.0);
    add_edge_bidirectional(&mut edges, D, E, 10.0);
    add_edge_bidirectional(&mut edges, E, F, 10.0);
    add_edge_bidirectional(&mut edges, C, G, 5.0);
    NetworkGraph::from_edges(7, &edges)
}

/// `n x n` points, neighbours connected with cost 1 horizontally and 2
/// vertically.
pub fn get_grid_graph(n: PointIndex) -> NetworkGraph {
    let mut edges = Vec::new();
    for row in 0..n {
        for column in 0..n {
            let point = row * n + column;
            if column + 1 < n {
                add_edge_bidirectional(&mut edges, point, point + 1, 1.0);
            }
            if row + 1 < n {
                add_edge_bidirectional(&mut edges, point, point + n, 2.0);
            }
        }
    }
    NetworkGraph::from_edges((n * n) as usize, &edges)
}

pub fn dijkstra_distances(graph: &NetworkGraph, source: PointIndex) -> Vec<Option<Distance>> {
    let mut data = DijkstraData::new();
    network_dijkstra(
        graph,
        source,
        None,
        &SearchLimits::default(),
        |_| false,
        &mut data,
    );
    (0..graph.number_of_points() as PointIndex)
        .map(|point| data.distance(point))
        .collect()
}
