use serde_derive::{Deserialize, Serialize};

use super::{Distance, PointIndex};

/// Directed edge of the network point graph. `shortcut` separates edges
/// created by contraction from edges computed on the road graph.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub struct NetworkEdge {
    tail: PointIndex,
    head: PointIndex,
    distance: Distance,
    shortcut: bool,
}

impl NetworkEdge {
    pub fn new(
        tail: PointIndex,
        head: PointIndex,
        distance: Distance,
        shortcut: bool,
    ) -> Option<NetworkEdge> {
        if tail == head || !distance.is_finite() || distance < 0.0 {
            return None;
        }

        Some(NetworkEdge {
            tail,
            head,
            distance,
            shortcut,
        })
    }

    pub fn tail(&self) -> PointIndex {
        self.tail
    }

    pub fn head(&self) -> PointIndex {
        self.head
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn is_shortcut(&self) -> bool {
        self.shortcut
    }

    pub fn reversed(&self) -> NetworkEdge {
        NetworkEdge {
            tail: self.head,
            head: self.tail,
            ..*self
        }
    }

    pub fn tailless(&self) -> TaillessEdge {
        TaillessEdge {
            head: self.head,
            distance: self.distance,
            shortcut: self.shortcut,
        }
    }

    pub fn headless(&self) -> HeadlessEdge {
        HeadlessEdge {
            tail: self.tail,
            distance: self.distance,
            shortcut: self.shortcut,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TaillessEdge {
    head: PointIndex,
    distance: Distance,
    shortcut: bool,
}

impl TaillessEdge {
    pub fn head(&self) -> PointIndex {
        self.head
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn is_shortcut(&self) -> bool {
        self.shortcut
    }

    pub fn set_tail(&self, tail: PointIndex) -> NetworkEdge {
        NetworkEdge {
            tail,
            head: self.head,
            distance: self.distance,
            shortcut: self.shortcut,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeadlessEdge {
    tail: PointIndex,
    distance: Distance,
    shortcut: bool,
}

impl HeadlessEdge {
    pub fn tail(&self) -> PointIndex {
        self.tail
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    pub fn is_shortcut(&self) -> bool {
        self.shortcut
    }

    pub fn set_head(&self, head: PointIndex) -> NetworkEdge {
        NetworkEdge {
            tail: self.tail,
            head,
            distance: self.distance,
            shortcut: self.shortcut,
        }
    }
}
