mod common;

use common::{dijkstra_distances, get_grid_graph, get_line_graph, get_small_graph};
use hh_network::{
    ch::{contraction::ShortcutCandidate, ContractionHierarchyBuilder},
    config::ContractionConfig,
    error::{PrepError, StructuralError},
    graphs::{edge::NetworkEdge, network_graph::NetworkGraph, Distance, PointIndex},
};

fn full_contraction() -> ContractionConfig {
    ContractionConfig {
        contract_percent: 1.0,
        ..ContractionConfig::default()
    }
}

/// Shortest distance using only edges towards higher ranks from both ends.
fn ch_distance(
    graph: &NetworkGraph,
    ranks: &[Option<u32>],
    source: PointIndex,
    target: PointIndex,
) -> Option<Distance> {
    let rank = |point: PointIndex| ranks[point as usize].unwrap();
    let mut upward = Vec::new();
    let mut downward_reversed = Vec::new();
    for tail in 0..graph.number_of_points() as PointIndex {
        for edge in graph.out_edges(tail) {
            if rank(edge.head()) > rank(tail) {
                upward.push(edge);
            } else {
                downward_reversed.push(edge.reversed());
            }
        }
    }
    let forward = dijkstra_distances(
        &NetworkGraph::from_edges(graph.number_of_points(), &upward),
        source,
    );
    let backward = dijkstra_distances(
        &NetworkGraph::from_edges(graph.number_of_points(), &downward_reversed),
        target,
    );
    forward
        .iter()
        .zip(backward.iter())
        .filter_map(|(f, b)| Some((*f)? + (*b)?))
        .min_by(|a, b| a.total_cmp(b))
}

fn assert_queries_match(original: &NetworkGraph, builder: &ContractionHierarchyBuilder) {
    for source in 0..original.number_of_points() as PointIndex {
        let expected = dijkstra_distances(original, source);
        for target in 0..original.number_of_points() as PointIndex {
            let found = ch_distance(builder.graph(), builder.ranks(), source, target);
            match (expected[target as usize], found) {
                (Some(expected), Some(found)) => assert!(
                    (expected - found).abs() < 1e-9,
                    "{} -> {}: {} != {}",
                    source,
                    target,
                    expected,
                    found
                ),
                (None, None) => {}
                (expected, found) => panic!("{} -> {}: {:?} != {:?}", source, target, expected, found),
            }
        }
    }
}

#[test]
fn line_contracts_the_middle_first() {
    let config = ContractionConfig {
        contract_percent: 0.1,
        ..ContractionConfig::default()
    };
    let mut builder = ContractionHierarchyBuilder::new(&config, get_line_graph());
    assert_eq!(builder.edge_difference(0), -2);
    assert_eq!(builder.edge_difference(3), 0);

    assert_eq!(builder.run().unwrap(), 1);
    assert_eq!(builder.ranks()[0], Some(0));
    assert!(builder.ranks()[1..].iter().all(Option::is_none));
    assert!(builder.is_excluded(0));

    let shortcuts = builder.shortcuts();
    assert_eq!(shortcuts.len(), 2);
    let (edge, info) = &shortcuts[0];
    assert_eq!((edge.tail(), edge.head(), edge.distance()), (3, 4, 20.0));
    assert_eq!(info.chain, vec![3, 0, 4]);
    let (edge, info) = &shortcuts[1];
    assert_eq!((edge.tail(), edge.head(), edge.distance()), (4, 3, 20.0));
    assert_eq!(info.chain, vec![4, 0, 3]);
    assert_eq!(builder.stats().added, 2);
}

/// Points 1 and 2 are joined directly at 100 and through 0 at 20. Points 3
/// and 4 hang off 1, points 5 and 6 off 2.
fn get_long_direct_graph() -> NetworkGraph {
    graph_from(
        7,
        &[
            (1, 2, 100.0),
            (1, 0, 10.0),
            (0, 2, 10.0),
            (1, 3, 5.0),
            (1, 4, 5.0),
            (2, 5, 5.0),
            (2, 6, 5.0),
        ],
    )
}

#[test]
fn full_contraction_keeps_distances() {
    let config = full_contraction();
    for graph in [
        get_line_graph(),
        get_small_graph(),
        get_grid_graph(5),
        get_long_direct_graph(),
    ] {
        let mut builder = ContractionHierarchyBuilder::new(&config, graph.clone());
        assert_eq!(builder.run().unwrap(), graph.number_of_points());

        let mut ranks: Vec<u32> = builder.ranks().iter().map(|rank| rank.unwrap()).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (0..graph.number_of_points() as u32).collect::<Vec<_>>());

        assert_queries_match(&graph, &builder);
    }
}

#[test]
fn shortcut_chains_expand_to_original_edges() {
    let config = full_contraction();
    let graph = get_grid_graph(4);
    let mut builder = ContractionHierarchyBuilder::new(&config, graph.clone());
    builder.run().unwrap();

    for (edge, info) in builder.shortcuts() {
        assert!(info.chain.len() >= 3);
        assert_eq!(info.chain[0], edge.tail());
        assert_eq!(*info.chain.last().unwrap(), edge.head());
        let length: Distance = info
            .chain
            .windows(2)
            .map(|pair| graph.get_edge(pair[0], pair[1]).unwrap().distance())
            .sum();
        assert!((length - edge.distance()).abs() < 1e-9);
    }
}

#[test]
fn contraction_stops_at_the_configured_share() {
    let config = ContractionConfig {
        contract_percent: 0.5,
        ..ContractionConfig::default()
    };
    let mut builder = ContractionHierarchyBuilder::new(&config, get_grid_graph(4));
    assert_eq!(builder.run().unwrap(), 8);

    let mut ranks: Vec<u32> = builder.ranks().iter().filter_map(|rank| *rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, (0..8).collect::<Vec<_>>());
    let excluded = (0..16).filter(|&point| builder.is_excluded(point)).count();
    assert_eq!(excluded, 8);
}

fn graph_from(number_of_points: usize, edges: &[(PointIndex, PointIndex, Distance)]) -> NetworkGraph {
    let mut all = Vec::new();
    for &(tail, head, distance) in edges {
        all.push(NetworkEdge::new(tail, head, distance, false).unwrap());
        all.push(NetworkEdge::new(head, tail, distance, false).unwrap());
    }
    NetworkGraph::from_edges(number_of_points, &all)
}

fn candidate(tail: PointIndex, head: PointIndex, distance: Distance) -> ShortcutCandidate {
    ShortcutCandidate {
        tail,
        head,
        distance,
        witnesses: 0,
    }
}

#[test]
fn cheaper_shortcut_replaces_existing_one() {
    let config = full_contraction();
    let graph = graph_from(4, &[(2, 0, 10.0), (0, 3, 10.0), (2, 1, 5.0), (1, 3, 5.0)]);
    let mut builder = ContractionHierarchyBuilder::new(&config, graph);

    builder
        .contract_point(0, vec![candidate(2, 3, 20.0), candidate(3, 2, 20.0)])
        .unwrap();
    assert_eq!(builder.stats().added, 2);
    builder
        .contract_point(1, vec![candidate(2, 3, 10.0), candidate(3, 2, 10.0)])
        .unwrap();
    assert_eq!(builder.stats().replaced, 2);

    let shortcuts = builder.shortcuts();
    assert_eq!(shortcuts.len(), 2);
    let (edge, info) = &shortcuts[0];
    assert_eq!((edge.tail(), edge.head(), edge.distance()), (2, 3, 10.0));
    assert_eq!(info.chain, vec![2, 1, 3]);
    assert_eq!(builder.ranks(), &[Some(0), Some(1), None, None]);
}

#[test]
fn shortcut_undercuts_longer_direct_edge() {
    let config = full_contraction();
    let graph = graph_from(3, &[(1, 2, 100.0), (1, 0, 10.0), (0, 2, 10.0)]);
    let mut builder = ContractionHierarchyBuilder::new(&config, graph);

    let shortcuts = builder.required_shortcuts(0);
    assert_eq!(shortcuts.len(), 2);
    builder.contract_point(0, shortcuts).unwrap();

    assert_eq!(builder.stats().triangle_violations, 2);
    assert_eq!(builder.stats().added, 2);
    let edge = builder.graph().get_edge(1, 2).unwrap();
    assert_eq!(edge.distance(), 20.0);
    assert!(edge.is_shortcut());

    let shortcuts = builder.shortcuts();
    assert_eq!(shortcuts.len(), 2);
    assert_eq!(shortcuts[0].1.chain, vec![1, 0, 2]);
    assert_eq!(shortcuts[1].1.chain, vec![2, 0, 1]);
}

#[test]
fn contracting_the_cheap_middle_first_keeps_its_path() {
    let config = ContractionConfig {
        contract_percent: 0.1,
        ..ContractionConfig::default()
    };
    let mut builder = ContractionHierarchyBuilder::new(&config, get_long_direct_graph());
    assert_eq!(builder.run().unwrap(), 1);
    assert!(builder.is_excluded(0));

    for (tail, head) in [(1, 2), (2, 1)] {
        let edge = builder.graph().get_edge(tail, head).unwrap();
        assert_eq!(edge.distance(), 20.0);
        assert!(edge.is_shortcut());
    }
}

#[test]
fn equal_direct_edge_makes_shortcut_redundant() {
    let config = full_contraction();
    let graph = graph_from(3, &[(1, 2, 20.0), (1, 0, 10.0), (0, 2, 10.0)]);
    let mut builder = ContractionHierarchyBuilder::new(&config, graph);

    let shortcuts = builder.required_shortcuts(0);
    assert_eq!(shortcuts.len(), 2);
    builder.contract_point(0, shortcuts).unwrap();

    assert_eq!(builder.stats().skipped, 2);
    assert_eq!(builder.stats().added, 0);
    assert!(!builder.graph().get_edge(1, 2).unwrap().is_shortcut());
}

#[test]
fn witness_makes_shortcut_unnecessary() {
    let config = full_contraction();
    let graph = graph_from(3, &[(1, 2, 15.0), (1, 0, 10.0), (0, 2, 10.0)]);
    let mut builder = ContractionHierarchyBuilder::new(&config, graph);
    assert!(builder.required_shortcuts(0).is_empty());
    assert_eq!(builder.edge_difference(0), -4);
}

#[test]
fn shortcut_below_its_parts_is_rejected() {
    let config = full_contraction();
    let graph = graph_from(3, &[(1, 0, 10.0), (0, 2, 10.0)]);
    let mut builder = ContractionHierarchyBuilder::new(&config, graph);

    let error = builder
        .contract_point(0, vec![candidate(1, 2, 5.0)])
        .unwrap_err();
    assert!(matches!(
        error,
        PrepError::Structural(StructuralError::ShortcutTooCheap { from: 1, to: 2, .. })
    ));

    let error = builder
        .contract_point(0, vec![candidate(2, 2, 20.0)])
        .unwrap_err();
    assert!(error.is_structural());
    assert_eq!(builder.stats().added, 0);
}
