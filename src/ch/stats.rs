use log::info;

use crate::{graphs::network_graph::NetworkGraph, utility::format_histogram};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContractionStats {
    pub points: usize,
    pub contracted: usize,
    pub reindexed: usize,
    pub added: usize,
    pub replaced: usize,
    pub skipped: usize,
    /// Added shortcuts that undercut a direct segment between the same points.
    pub triangle_violations: usize,
    pub witness_searches: usize,
    pub settled: usize,
}

impl ContractionStats {
    pub fn log(&self) {
        info!(
            "Contracted {} of {} points ({} reindexed): shortcuts {} added, {} replaced, {} skipped, {} triangle violations",
            self.contracted,
            self.points,
            self.reindexed,
            self.added,
            self.replaced,
            self.skipped,
            self.triangle_violations
        );
        info!(
            "Witness searches {}, settled {} points (avg {:.1})",
            self.witness_searches,
            self.settled,
            self.settled as f64 / self.witness_searches.max(1) as f64
        );
    }
}

/// Degrees (in plus out) of the points not yet contracted, counting only
/// edges between such points.
pub fn remaining_degrees(graph: &NetworkGraph, excluded: &[bool]) -> Vec<usize> {
    let is_excluded = |point: u32| excluded.get(point as usize).copied().unwrap_or(false);
    (0..graph.number_of_points() as u32)
        .filter(|&point| !is_excluded(point))
        .map(|point| {
            graph
                .out_edges(point)
                .filter(|edge| !is_excluded(edge.head()))
                .count()
                + graph
                    .in_edges(point)
                    .filter(|edge| !is_excluded(edge.tail()))
                    .count()
        })
        .collect()
}

pub fn degree_histogram(graph: &NetworkGraph, excluded: &[bool]) -> String {
    format_histogram(remaining_degrees(graph, excluded), 5, 50)
}
