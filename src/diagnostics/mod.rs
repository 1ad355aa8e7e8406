//! Experimental measurements over a prepared store. None of them change
//! points or segments.

use rand::{rngs::StdRng, SeedableRng};

use crate::config::DiagnosticsConfig;

pub mod midpoints;
pub mod monte_carlo;
pub mod second_level;

pub use midpoints::calculate_mid_points;
pub use monte_carlo::run_monte_carlo_routing;
pub use second_level::run_second_level_routing;

fn rng(config: &DiagnosticsConfig) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
