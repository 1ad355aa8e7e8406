use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use log::debug;
use serde_derive::{Deserialize, Serialize};

use super::{FrontierEntry, RegionInfo, RoadGraphSource, RoadSegment, SearchFrontier};
use crate::{
    error::{PrepError, Result},
    geo::{distance_31, midpoint_31},
    graphs::{road_edge::RoadEdgeIdentity, Distance, PointId, RoadId},
    search::queue::{DijkstraQueueElement, HeapQueue},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub id: RoadId,
    pub points: Vec<(i32, i32)>,
    /// 1: only along the point order, -1: only against it, 0: both.
    #[serde(default)]
    pub oneway: i8,
}

impl Road {
    fn allows(&self, identity: &RoadEdgeIdentity) -> bool {
        match self.oneway {
            0 => true,
            o if o > 0 => identity.is_positive(),
            _ => !identity.is_positive(),
        }
    }

    fn segment(&self, start: u32, end: u32) -> Option<RoadSegment> {
        let identity = RoadEdgeIdentity::new(self.id, start, end)?;
        let start_point = *self.points.get(start as usize)?;
        let end_point = *self.points.get(end as usize)?;
        Some(RoadSegment::new(identity, start_point, end_point))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionData {
    pub info: RegionInfo,
    pub roads: Vec<Road>,
}

/// Decoded road graph, one entry per source region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadGraphData {
    pub regions: Vec<RegionData>,
}

impl RoadGraphData {
    /// Reads `.json` files with serde_json and everything else as bincode.
    pub fn from_file(path: &Path) -> Result<RoadGraphData> {
        let reader = BufReader::new(File::open(path)?);
        if is_json(path) {
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(bincode::deserialize_from(reader)?)
        }
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        if is_json(path) {
            serde_json::to_writer(writer, self)?;
        } else {
            bincode::serialize_into(writer, self)?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: RoadGraphData) {
        self.regions.extend(other.regions);
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |extension| extension == "json")
}

/// Lookup tables built lazily for the currently open regions.
struct RoadCache {
    roads: HashMap<RoadId, (usize, usize)>,
    points: HashMap<(i32, i32), Vec<(RoadId, u32)>>,
}

fn build_cache(data: &RoadGraphData, open_files: Option<&HashSet<String>>) -> RoadCache {
    let mut roads = HashMap::new();
    let mut points: HashMap<(i32, i32), Vec<(RoadId, u32)>> = HashMap::new();
    let open_regions = data.regions.iter().enumerate().filter(|(_, region)| {
        open_files.map_or(true, |files| files.contains(&region.info.filename))
    });
    for (region_idx, region) in open_regions {
        for (road_idx, road) in region.roads.iter().enumerate() {
            if roads.insert(road.id, (region_idx, road_idx)).is_some() {
                // road shared by overlapping regions
                continue;
            }
            for (point_idx, point) in road.points.iter().enumerate() {
                points
                    .entry(*point)
                    .or_default()
                    .push((road.id, point_idx as u32));
            }
        }
    }
    RoadCache { roads, points }
}

/// `RoadGraphSource` over fully decoded road lists. Lookup tables act as the
/// decoded cache: `reload` drops them and limits them to the given files.
pub struct InMemoryRoadGraph {
    data: RoadGraphData,
    open_files: Option<HashSet<String>>,
    cache: Option<RoadCache>,
    reloads: usize,
}

impl InMemoryRoadGraph {
    pub fn new(data: RoadGraphData) -> InMemoryRoadGraph {
        InMemoryRoadGraph {
            data,
            open_files: None,
            cache: None,
            reloads: 0,
        }
    }

    pub fn from_files(paths: &[impl AsRef<Path>]) -> Result<InMemoryRoadGraph> {
        let mut data = RoadGraphData::default();
        for path in paths {
            data.merge(RoadGraphData::from_file(path.as_ref())?);
        }
        debug!("Loaded {} regions", data.regions.len());
        Ok(InMemoryRoadGraph::new(data))
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    fn cache(&mut self) -> &RoadCache {
        self.cache
            .get_or_insert_with(|| build_cache(&self.data, self.open_files.as_ref()))
    }

    fn road(&mut self, road_id: RoadId) -> Option<&Road> {
        let (region_idx, road_idx) = *self.cache().roads.get(&road_id)?;
        self.data.regions.get(region_idx)?.roads.get(road_idx)
    }

    /// Directed traversals leaving `point`, oneway restrictions applied.
    fn outgoing(&mut self, point: (i32, i32)) -> Result<Vec<RoadSegment>> {
        let mut outgoing = Vec::new();
        for segment in self.segments_at(point.0, point.1)? {
            for directed in [segment, segment.reversed()] {
                if directed.start_point() != point {
                    continue;
                }
                let allowed = self
                    .road(directed.identity.road_id())
                    .map_or(false, |road| road.allows(&directed.identity));
                if allowed {
                    outgoing.push(directed);
                }
            }
        }
        Ok(outgoing)
    }
}

impl RoadGraphSource for InMemoryRoadGraph {
    fn regions(&self) -> Vec<RegionInfo> {
        self.data
            .regions
            .iter()
            .map(|region| region.info.clone())
            .collect()
    }

    fn reload(&mut self, files: Option<&[String]>) -> Result<()> {
        self.cache = None;
        self.open_files = files.map(|files| files.iter().cloned().collect());
        self.reloads += 1;
        Ok(())
    }

    fn region_roads(&mut self, region: &RegionInfo) -> Result<Vec<RoadSegment>> {
        let data = self
            .data
            .regions
            .iter()
            .find(|data| data.info.name == region.name)
            .ok_or_else(|| PrepError::Source(format!("unknown region {}", region.name)))?;
        Ok(data
            .roads
            .iter()
            .filter_map(|road| road.segment(0, 1))
            .collect())
    }

    fn segments_at(&mut self, x: i32, y: i32) -> Result<Vec<RoadSegment>> {
        let incident = match self.cache().points.get(&(x, y)) {
            Some(incident) => incident.clone(),
            None => return Ok(Vec::new()),
        };
        let mut segments = Vec::new();
        for (road_id, point_idx) in incident {
            let Some(road) = self.road(road_id) else {
                continue;
            };
            if point_idx > 0 {
                segments.extend(road.segment(point_idx - 1, point_idx));
            }
            segments.extend(road.segment(point_idx, point_idx + 1));
        }
        segments.sort_by_key(|segment| segment.directed_id());
        segments.dedup();
        Ok(segments)
    }

    fn find_segment(&mut self, identity: RoadEdgeIdentity) -> Result<Option<RoadSegment>> {
        Ok(self
            .road(identity.road_id())
            .and_then(|road| road.segment(identity.start(), identity.end())))
    }

    fn nearest_segment(&mut self, x: i32, y: i32) -> Result<Option<RoadSegment>> {
        let road_ids: Vec<RoadId> = self.cache().roads.keys().copied().collect();
        let mut nearest: Option<(Distance, RoadSegment)> = None;
        for road_id in road_ids {
            let Some(road) = self.road(road_id) else {
                continue;
            };
            for start in 1..road.points.len() as u32 {
                let Some(segment) = road.segment(start - 1, start) else {
                    continue;
                };
                let (mx, my) = midpoint_31(segment.start_x, segment.start_y, segment.end_x, segment.end_y);
                let distance = distance_31(x, y, mx, my);
                let closer = match &nearest {
                    Some((best, best_segment)) => {
                        distance < *best
                            || (distance == *best && segment.point_id() < best_segment.point_id())
                    }
                    None => true,
                };
                if closer {
                    nearest = Some((distance, segment));
                }
            }
        }
        Ok(nearest.map(|(_, segment)| segment))
    }

    fn search(
        &mut self,
        start: &RoadSegment,
        targets: &HashSet<PointId>,
    ) -> Result<SearchFrontier> {
        let mut frontier = SearchFrontier::new();
        let mut queue: HeapQueue<PointId> = HeapQueue::new();
        let mut settled: HashSet<PointId> = HashSet::new();

        for directed in [*start, start.reversed()] {
            let allowed = self
                .road(directed.identity.road_id())
                .map_or(false, |road| road.allows(&directed.identity));
            if allowed {
                frontier.label(FrontierEntry {
                    segment: directed,
                    distance: 0.0,
                    parent: None,
                });
                queue.push(DijkstraQueueElement::new(0.0, directed.directed_id()));
            }
        }
        let origin = start.point_id();

        while let Some(state) = queue.pop() {
            if !settled.insert(state.key) {
                continue;
            }
            let Some(entry) = frontier.entry(state.key).cloned() else {
                continue;
            };
            if entry.segment.point_id() != origin && targets.contains(&state.key) {
                frontier.mark_reached(state.key);
                continue;
            }
            frontier.settled += 1;

            let half = self.segment_distance(&entry.segment) / 2.0;
            for next in self.outgoing(entry.segment.end_point())? {
                if next.identity == entry.segment.identity.reversed() {
                    continue;
                }
                let next_id = next.directed_id();
                if settled.contains(&next_id) {
                    continue;
                }
                let distance = entry.distance + half + self.segment_distance(&next) / 2.0;
                let improves = frontier
                    .entry(next_id)
                    .map_or(true, |current| distance < current.distance);
                if improves {
                    frontier.label(FrontierEntry {
                        segment: next,
                        distance,
                        parent: Some(state.key),
                    });
                    queue.push(DijkstraQueueElement::new(distance, next_id));
                }
            }
        }

        Ok(frontier)
    }

    fn cached_points(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.points.values().map(Vec::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const O: i32 = 1 << 30;

    fn info(name: &str) -> RegionInfo {
        RegionInfo {
            name: name.to_string(),
            filename: format!("{}.json", name),
            file_pointer: 0,
            size: 0,
            left: 0.0,
            right: 1.0,
            top: 1.0,
            bottom: 0.0,
        }
    }

    fn graph() -> InMemoryRoadGraph {
        let straight = Road {
            id: 1,
            points: vec![(O, O), (O + 100, O), (O + 200, O)],
            oneway: 0,
        };
        let oneway = Road {
            id: 2,
            points: vec![(O + 200, O), (O + 200, O + 100)],
            oneway: 1,
        };
        let far = Road {
            id: 3,
            points: vec![(O + 5000, O), (O + 5100, O)],
            oneway: 0,
        };
        InMemoryRoadGraph::new(RoadGraphData {
            regions: vec![
                RegionData {
                    info: info("a"),
                    roads: vec![straight, oneway],
                },
                RegionData {
                    info: info("b"),
                    roads: vec![far],
                },
            ],
        })
    }

    #[test]
    fn junction_lists_segments_of_both_roads() {
        let mut graph = graph();
        let segments = graph.segments_at(O + 200, O).unwrap();
        let roads: Vec<RoadId> = segments
            .iter()
            .map(|segment| segment.identity.road_id())
            .collect();
        assert_eq!(roads, vec![1, 2]);
        assert!(segments.iter().all(|segment| segment.identity.is_positive()));
        assert_eq!(graph.region_roads(&info("a")).unwrap().len(), 2);
    }

    #[test]
    fn search_respects_oneway_and_half_lengths() {
        let mut graph = graph();
        let start = graph
            .find_segment(RoadEdgeIdentity::new(1, 0, 1).unwrap())
            .unwrap()
            .unwrap();
        let target = RoadEdgeIdentity::new(2, 0, 1).unwrap();
        let mut targets = HashSet::new();
        targets.insert(target.directed_id());
        targets.insert(target.reversed().directed_id());

        let frontier = graph.search(&start, &targets).unwrap();
        let reached: Vec<&FrontierEntry> = frontier.reached().collect();
        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].segment.directed_id(), target.directed_id());

        let middle = graph
            .find_segment(RoadEdgeIdentity::new(1, 1, 2).unwrap())
            .unwrap()
            .unwrap();
        let last = graph.find_segment(target).unwrap().unwrap();
        let expected = start.length() / 2.0 + middle.length() + last.length() / 2.0;
        assert!((reached[0].distance - expected).abs() < 1e-9);
        assert_eq!(frontier.path_to(target.directed_id()).len(), 3);
    }

    #[test]
    fn reload_limits_lookups_to_open_files() {
        let mut graph = graph();
        let far = RoadEdgeIdentity::new(3, 0, 1).unwrap();
        assert!(graph.find_segment(far).unwrap().is_some());
        assert!(graph.cached_points() > 0);

        graph.reload(Some(&["a.json".to_string()])).unwrap();
        assert_eq!(graph.cached_points(), 0);
        assert!(graph.find_segment(far).unwrap().is_none());
        assert!(graph.segments_at(O + 5000, O).unwrap().is_empty());

        graph.reload(None).unwrap();
        assert!(graph.find_segment(far).unwrap().is_some());
        assert_eq!(graph.reloads(), 2);
    }
}
