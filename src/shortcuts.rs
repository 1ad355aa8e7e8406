//! Exact shortest connections between network points, computed on the full
//! road graph.

use std::time::Instant;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use log::info;

use crate::{
    config::PrepConfig,
    error::{Result, StructuralError},
    graphs::{
        network_point::NetworkPoint, road_edge::RoadEdgeIdentity, segment::NetworkSegment,
        PointId, PointIndex,
    },
    memory::MemoryGovernor,
    source::{RoadGraphSource, SearchFrontier},
    store::GraphStore,
    utility::get_progressbar_long_jobs,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShortcutStats {
    pub points: usize,
    pub skipped: usize,
    pub segments: usize,
    pub max_segments_per_point: usize,
    pub max_settled: usize,
    pub total_settled: usize,
    pub reloads: usize,
    pub stopped_early: bool,
}

impl ShortcutStats {
    pub fn log(&self) {
        let points = self.points.max(1);
        info!(
            "Total {} points: {} segments, per border point max {}, average {} segments (routing sub graph max {}, avg {} segments)",
            self.points,
            self.segments,
            self.max_segments_per_point,
            self.segments / points,
            self.max_settled,
            self.total_settled / points
        );
        info!("Road graph reloaded {} times", self.reloads);
    }
}

/// Computes for every network point the segments to the network points it
/// reaches without passing another one.
pub struct BorderShortcutBuilder<'a> {
    points: &'a [NetworkPoint],
    by_id: HashMap<PointId, PointIndex>,
    targets: HashSet<PointId>,
}

impl<'a> BorderShortcutBuilder<'a> {
    pub fn new(points: &'a [NetworkPoint]) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(points.len());
        let mut targets = HashSet::with_capacity(points.len() * 2);
        for point in points {
            let identity = identity_of(point)?;
            by_id.insert(identity.point_id(), point.index);
            targets.insert(identity.directed_id());
            targets.insert(identity.reversed().directed_id());
        }
        Ok(BorderShortcutBuilder {
            points,
            by_id,
            targets,
        })
    }

    /// Segments leaving `point`, ordered by distance.
    pub fn segments_from(
        &mut self,
        point: &NetworkPoint,
        source: &mut dyn RoadGraphSource,
    ) -> Result<(Vec<NetworkSegment>, usize)> {
        let identity = identity_of(point)?;
        let start = source
            .find_segment(identity)?
            .ok_or(StructuralError::MissingEdge { point: point.id })?;

        let own = [identity.directed_id(), identity.reversed().directed_id()];
        let removed: Vec<PointId> = own
            .into_iter()
            .filter(|id| self.targets.remove(id))
            .collect();
        let frontier = source.search(&start, &self.targets);
        self.targets.extend(removed);
        let frontier = frontier?;

        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for reached in frontier.reached() {
            let reached_id = reached.segment.point_id();
            if !seen.insert(reached_id) {
                continue;
            }
            let end = *self
                .by_id
                .get(&reached_id)
                .ok_or(StructuralError::MissingPoint { point: reached_id })?;
            if reached.distance.is_nan() || reached.distance <= 0.0 {
                return Err(StructuralError::NonPositiveDistance {
                    from: point.index,
                    to: end,
                    distance: reached.distance,
                }
                .into());
            }
            segments.push(NetworkSegment {
                start: point.index,
                end,
                distance: reached.distance,
                geometry: geometry_to(&frontier, reached.segment.directed_id()),
                shortcut: None,
            });
        }
        Ok((segments, frontier.settled))
    }

    pub fn points(&self) -> &'a [NetworkPoint] {
        self.points
    }
}

fn identity_of(point: &NetworkPoint) -> Result<RoadEdgeIdentity> {
    point
        .identity()
        .ok_or_else(|| StructuralError::MissingEdge { point: point.id }.into())
}

/// Start of every traversal from the origin to the target, then the end of
/// the target.
fn geometry_to(frontier: &SearchFrontier, directed_id: PointId) -> Vec<(i32, i32)> {
    let path = frontier.path_to(directed_id);
    let mut geometry: Vec<(i32, i32)> = path
        .iter()
        .map(|entry| entry.segment.start_point())
        .collect();
    if let Some(last) = path.last() {
        geometry.push(last.segment.end_point());
    }
    geometry
}

/// Shortcut phase: one search per network point, segments persisted per
/// point. Points that already own segments are skipped, so an interrupted
/// run continues where it stopped.
pub fn build_network_shortcuts(
    config: &PrepConfig,
    source: &mut dyn RoadGraphSource,
    store: &mut GraphStore,
    governor: &mut MemoryGovernor,
) -> Result<ShortcutStats> {
    let points = store.load_points()?;
    let done = store.points_with_segments()?;
    let mut builder = BorderShortcutBuilder::new(&points)?;
    let mut stats = ShortcutStats::default();
    info!("Building shortcuts for {} network points", points.len());

    governor.maybe_reload(source, None, true)?;
    let bar = get_progressbar_long_jobs("Shortcuts", points.len() as u64);
    let start = Instant::now();
    let mut last_log = 0;
    for (ind, point) in builder.points().iter().enumerate() {
        bar.inc(1);
        if ind > 0 && ind % config.shortcuts.reload_every == 0 {
            governor.maybe_reload(source, None, false)?;
        }
        if done.contains(&point.index) {
            stats.skipped += 1;
            continue;
        }
        if config.debug.limit_reached(stats.points) {
            stats.stopped_early = true;
            break;
        }

        let (segments, settled) = builder.segments_from(point, source)?;
        store.insert_segments(&segments)?;

        stats.points += 1;
        stats.segments += segments.len();
        stats.max_segments_per_point = stats.max_segments_per_point.max(segments.len());
        stats.max_settled = stats.max_settled.max(settled);
        stats.total_settled += settled;

        if ind - last_log > config.shortcuts.log_every {
            last_log = ind;
            let passed = start.elapsed().as_secs_f64();
            info!(
                "{:.2}% Process {} ({} shortcuts), passed {:.1} sec, left {:.1} sec",
                ind as f64 * 100.0 / points.len() as f64,
                point.index,
                segments.len(),
                passed,
                passed * (points.len() as f64 / (ind + 1) as f64 - 1.0)
            );
        }
    }
    bar.finish_and_clear();
    stats.reloads = governor.reloads();
    stats.log();
    Ok(stats)
}
