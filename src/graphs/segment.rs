use serde_derive::{Deserialize, Serialize};

use super::{edge::NetworkEdge, Distance, PointIndex};

/// Contraction data of a shortcut segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShortcutInfo {
    /// Points the shortcut runs through, both endpoints included.
    pub chain: Vec<PointIndex>,
    pub witnesses: u32,
}

/// Directed connection between two network points as persisted in the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkSegment {
    pub start: PointIndex,
    pub end: PointIndex,
    pub distance: Distance,
    pub geometry: Vec<(i32, i32)>,
    pub shortcut: Option<ShortcutInfo>,
}

impl NetworkSegment {
    pub fn direct(start: PointIndex, end: PointIndex, distance: Distance) -> NetworkSegment {
        NetworkSegment {
            start,
            end,
            distance,
            geometry: Vec::new(),
            shortcut: None,
        }
    }

    pub fn is_shortcut(&self) -> bool {
        self.shortcut.is_some()
    }

    pub fn edge(&self) -> Option<NetworkEdge> {
        NetworkEdge::new(self.start, self.end, self.distance, self.is_shortcut())
    }
}
