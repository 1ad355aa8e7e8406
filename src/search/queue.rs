use std::{cmp::Ordering, collections::BinaryHeap};

use crate::graphs::{Distance, PointIndex};

#[derive(Copy, Clone, Debug)]
pub struct DijkstraQueueElement<K = PointIndex> {
    pub distance: Distance,
    pub key: K,
}

impl<K> DijkstraQueueElement<K> {
    pub fn new(distance: Distance, key: K) -> DijkstraQueueElement<K> {
        DijkstraQueueElement { distance, key }
    }
}

impl<K: Ord> PartialEq for DijkstraQueueElement<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for DijkstraQueueElement<K> {}

// The priority queue depends on `Ord`.
// Explicitly implement the trait so the queue becomes a min-heap
// instead of a max-heap.
impl<K: Ord> Ord for DijkstraQueueElement<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip the ordering on distances and on keys, so ties pop the
        // smallest key first.
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.key.cmp(&self.key))
    }
}

// `PartialOrd` needs to be implemented as well.
impl<K: Ord> PartialOrd for DijkstraQueueElement<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone)]
pub struct HeapQueue<K = PointIndex> {
    queue: BinaryHeap<DijkstraQueueElement<K>>,
}

impl<K: Ord> Default for HeapQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> HeapQueue<K> {
    pub fn new() -> HeapQueue<K> {
        HeapQueue {
            queue: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, state: DijkstraQueueElement<K>) {
        self.queue.push(state)
    }

    pub fn pop(&mut self) -> Option<DijkstraQueueElement<K>> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
