use thiserror::Error;

use crate::graphs::{Distance, PointId, PointIndex};

pub type Result<T> = std::result::Result<T, PrepError>;

/// Inconsistencies in the data or in the algorithms. They abort the running
/// phase and are never retried.
#[derive(Debug, Error, PartialEq)]
pub enum StructuralError {
    #[error("point {point} is already interior to another cluster")]
    DuplicateInterior { point: PointId },

    #[error("point {point} was visited twice while building an island")]
    InconsistentVisit { point: PointId },

    #[error("segment {from} -> {to} has non-positive distance {distance}")]
    NonPositiveDistance {
        from: PointIndex,
        to: PointIndex,
        distance: Distance,
    },

    #[error("shortcut {from} -> {to} has distance {distance}, below its parts {expected}")]
    ShortcutTooCheap {
        from: PointIndex,
        to: PointIndex,
        distance: Distance,
        expected: Distance,
    },

    #[error("road edge for network point {point} not found in the road graph")]
    MissingEdge { point: PointId },

    #[error("network point {point} is unknown")]
    MissingPoint { point: PointId },

    #[error("geometry blob of {len} bytes is not a list of coordinate pairs")]
    InvalidGeometry { len: usize },
}

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("structural invariant violated: {0}")]
    Structural(#[from] StructuralError),

    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode failure: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("road graph source failure: {0}")]
    Source(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PrepError {
    pub fn is_structural(&self) -> bool {
        matches!(self, PrepError::Structural(_))
    }
}
