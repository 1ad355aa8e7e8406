mod common;

use common::{grid_source, test_config, GRID};
use hh_network::{
    ch::run_contraction_hierarchy,
    config::PrepConfig,
    diagnostics::{calculate_mid_points, run_monte_carlo_routing, run_second_level_routing},
    graphs::segment::NetworkSegment,
    memory::MemoryGovernor,
    partition::collect::collect_network_points,
    shortcuts::build_network_shortcuts,
    store::GraphStore,
};

fn prepared_store(config: &PrepConfig) -> GraphStore {
    let mut source = grid_source(GRID);
    let mut store = GraphStore::open_in_memory(config.store.batch_size).unwrap();
    let mut governor = MemoryGovernor::new(&config.memory);
    collect_network_points(config, &mut source, &mut store, &mut governor).unwrap();
    build_network_shortcuts(config, &mut source, &mut store, &mut governor).unwrap();
    store
}

fn shortcuts_of(store: &GraphStore) -> Vec<NetworkSegment> {
    store
        .load_segments(true)
        .unwrap()
        .into_iter()
        .filter(NetworkSegment::is_shortcut)
        .collect()
}

#[test]
fn contraction_ranks_every_point_and_stores_shortcuts() {
    let mut config = test_config();
    config.contraction.contract_percent = 1.0;
    let mut store = prepared_store(&config);
    let direct = store.load_segments(false).unwrap();

    let stats = run_contraction_hierarchy(&config.contraction, &mut store).unwrap();
    let points = store.load_points().unwrap();
    assert_eq!(stats.contracted, points.len());
    let mut ranks: Vec<u32> = points.iter().map(|point| point.ch_index.unwrap()).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, (0..points.len() as u32).collect::<Vec<_>>());

    assert_eq!(store.load_segments(false).unwrap(), direct);
    let shortcuts = shortcuts_of(&store);
    assert_eq!(shortcuts.len(), store.segment_count(true).unwrap());
    for shortcut in &shortcuts {
        let info = shortcut.shortcut.as_ref().unwrap();
        assert_eq!(info.chain.first(), Some(&shortcut.start));
        assert_eq!(info.chain.last(), Some(&shortcut.end));
        let length: f64 = info
            .chain
            .windows(2)
            .map(|pair| {
                direct
                    .iter()
                    .find(|segment| segment.start == pair[0] && segment.end == pair[1])
                    .unwrap()
                    .distance
            })
            .sum();
        assert!((length - shortcut.distance).abs() < 1e-6);
        let geometry = store
            .load_geometry(shortcut.start, shortcut.end, true)
            .unwrap()
            .unwrap();
        assert!(geometry.len() >= 2 * (info.chain.len() - 1));
    }

    run_contraction_hierarchy(&config.contraction, &mut store).unwrap();
    assert_eq!(shortcuts_of(&store), shortcuts);
    assert_eq!(store.load_points().unwrap(), points);
}

#[test]
fn diagnostics_run_on_a_prepared_store() {
    let mut config = test_config();
    config.diagnostics.seed = Some(7);
    config.diagnostics.iterations = 4;
    config.diagnostics.save_iterations = 2;
    let mut store = prepared_store(&config);
    let number_of_points = store.point_count().unwrap();

    let midpoints = calculate_mid_points(&config.diagnostics, &mut store).unwrap();
    assert_eq!(midpoints.iterations, 4.min(number_of_points / 2));
    assert_eq!(midpoints.counts.len(), number_of_points);
    let saved = store.load_midpoints().unwrap();
    let expected: Vec<(u32, u32)> = midpoints
        .counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(index, count)| (index as u32, *count))
        .collect();
    assert_eq!(saved, expected);

    config.diagnostics.iterations = 30;
    let routing = run_monte_carlo_routing(&config.diagnostics, &store).unwrap();
    assert_eq!(routing.iterations, 30);
    assert!(routing.routed > 0);
    assert!(routing.counts.iter().map(|&count| count as usize).sum::<usize>() >= routing.routed);
    assert!(routing
        .frequent
        .windows(2)
        .all(|pair| pair[0].1 >= pair[1].1));
    let again = run_monte_carlo_routing(&config.diagnostics, &store).unwrap();
    assert_eq!(again, routing);

    let second = run_second_level_routing(&config.diagnostics, &store).unwrap();
    assert!(second.clusters_before > 1);
    assert!(second.clusters_after <= second.clusters_before);
    assert!(second.points_before >= number_of_points);
    assert!(second.points_after <= second.points_before);
    assert!(second.excluded_points <= number_of_points);
}
