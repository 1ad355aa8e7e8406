//! Preparation of a hierarchical road network: road graph partitioning into
//! clusters, exact shortcuts between their border points and a contraction
//! hierarchy over the resulting point graph.

pub mod ch;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geo;
pub mod graphs;
pub mod memory;
pub mod partition;
pub mod search;
pub mod shortcuts;
pub mod source;
pub mod store;
pub mod utility;
