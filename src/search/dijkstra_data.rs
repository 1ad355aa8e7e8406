use ahash::{HashMap, HashMapExt};

use super::queue::{DijkstraQueueElement, HeapQueue};
use crate::graphs::{Distance, PointIndex};

#[derive(Clone, Copy, Debug, Default)]
pub struct DijkstraEntry {
    pub distance: Option<Distance>,
    pub predecessor: Option<PointIndex>,
    pub hops: u32,
    pub is_expanded: bool,
}

/// Scratch table of one search, keyed by point index. Cleared at the start of
/// every search so no distance or parent leaks between runs.
pub struct DijkstraData {
    queue: HeapQueue,
    entries: HashMap<PointIndex, DijkstraEntry>,
    settled: Vec<PointIndex>,
}

impl Default for DijkstraData {
    fn default() -> Self {
        Self::new()
    }
}

impl DijkstraData {
    pub fn new() -> DijkstraData {
        DijkstraData {
            queue: HeapQueue::new(),
            entries: HashMap::new(),
            settled: Vec::new(),
        }
    }

    pub fn clear(&mut self, source: PointIndex) {
        self.queue.clear();
        self.entries.clear();
        self.settled.clear();

        self.entries.entry(source).or_default().distance = Some(0.0);
        self.queue.push(DijkstraQueueElement::new(0.0, source));
    }

    pub fn pop(&mut self) -> Option<DijkstraQueueElement> {
        while let Some(state) = self.queue.pop() {
            let Some(entry) = self.entries.get_mut(&state.key) else {
                continue;
            };
            if !entry.is_expanded {
                entry.is_expanded = true;
                self.settled.push(state.key);
                return Some(state);
            }
        }

        None
    }

    /// Relaxes `tail -> head`. Returns whether the head label improved.
    pub fn update(&mut self, tail: PointIndex, head: PointIndex, edge_distance: Distance) -> bool {
        let Some(tail_entry) = self.entries.get(&tail).copied() else {
            return false;
        };
        let Some(tail_distance) = tail_entry.distance else {
            return false;
        };
        let alternative_distance = tail_distance + edge_distance;
        let head_entry = self.entries.entry(head).or_default();
        if head_entry.is_expanded {
            return false;
        }
        let current_distance = head_entry.distance.unwrap_or(Distance::INFINITY);
        if alternative_distance < current_distance {
            head_entry.predecessor = Some(tail);
            head_entry.distance = Some(alternative_distance);
            head_entry.hops = tail_entry.hops + 1;
            self.queue
                .push(DijkstraQueueElement::new(alternative_distance, head));
            return true;
        }
        false
    }

    pub fn entry(&self, point: PointIndex) -> Option<&DijkstraEntry> {
        self.entries.get(&point)
    }

    pub fn distance(&self, point: PointIndex) -> Option<Distance> {
        self.entries.get(&point)?.distance
    }

    pub fn hops(&self, point: PointIndex) -> Option<u32> {
        Some(self.entries.get(&point)?.hops)
    }

    pub fn is_settled(&self, point: PointIndex) -> bool {
        self.entries
            .get(&point)
            .map_or(false, |entry| entry.is_expanded)
    }

    /// Settled points in the order they left the queue.
    pub fn settled(&self) -> &[PointIndex] {
        &self.settled
    }

    pub fn search_space_size(&self) -> usize {
        self.settled.len()
    }

    /// Points from the source to `target`, both included.
    pub fn get_path(&self, target: PointIndex) -> Option<Vec<PointIndex>> {
        self.entries.get(&target)?.distance?;
        let mut route = vec![target];
        let mut current = target;
        while let Some(predecessor) = self.entries.get(&current)?.predecessor {
            current = predecessor;
            route.push(current);
        }
        route.reverse();
        Some(route)
    }
}
