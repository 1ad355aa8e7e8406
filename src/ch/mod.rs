//! Contraction hierarchy over the network point graph.

pub mod contraction;
pub mod priority;
pub mod stats;

pub use contraction::{run_contraction_hierarchy, ContractionHierarchyBuilder};
