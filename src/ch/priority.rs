use std::cmp::Ordering;

use crate::graphs::PointIndex;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChPriorityElement {
    pub point: PointIndex,
    pub priority: i32,
}

impl ChPriorityElement {
    pub fn new(priority: i32, point: PointIndex) -> Self {
        Self { point, priority }
    }
}

// The priority queue depends on `Ord`.
// Explicitly implement the trait so the queue becomes a min-heap
// instead of a max-heap.
impl Ord for ChPriorityElement {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip the ordering on priorities and on points, so ties pop the
        // smallest point index first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.point.cmp(&self.point))
    }
}

// `PartialOrd` needs to be implemented as well.
impl PartialOrd for ChPriorityElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
