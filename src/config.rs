use std::{fs::File, io::BufReader, path::Path};

use serde_derive::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Settings shared by every preparation phase. Built once by the operator and
/// handed to the phase entry points by reference.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub partition: PartitionConfig,
    pub shortcuts: ShortcutConfig,
    pub contraction: ContractionConfig,
    pub memory: MemoryConfig,
    pub store: StoreConfig,
    pub debug: DebugLimits,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Frontier size at which island expansion stops, indexed by depth - 1.
    /// Its length is the recursion budget of child islands.
    pub max_vert_depth_lookup: Vec<usize>,
    pub max_neighbors_points: usize,
    /// Meters.
    pub max_radius_island: f64,
    /// `[lat, lon]`: build only the cluster around the closest road edge.
    pub debug_point: Option<[f64; 2]>,
    pub resume: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_vert_depth_lookup: vec![15, 10, 5],
            max_neighbors_points: 50,
            max_radius_island: 50_000.0,
            debug_point: None,
            resume: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub reload_every: usize,
    pub log_every: usize,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            reload_every: 100,
            log_every: 500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractionConfig {
    /// Settled point budget of one witness search.
    pub max_witness_depth: usize,
    /// Share of points in `[0, 1]` contracted before stopping.
    pub contract_percent: f64,
    pub log_every: usize,
    pub degree_every: usize,
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self {
            max_witness_depth: 15,
            contract_percent: 0.8,
            log_every: 1000,
            degree_every: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub reload_threshold_mb: u64,
    pub reload_cooldown_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            reload_threshold_mb: 1000,
            reload_cooldown_secs: 120,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { batch_size: 10_000 }
    }
}

/// Operator early-stop counters for bounded test runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugLimits {
    pub start_offset: usize,
    pub process_limit: Option<usize>,
}

impl DebugLimits {
    pub fn limit_reached(&self, processed: usize) -> bool {
        self.process_limit
            .map_or(false, |limit| processed >= limit)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub iterations: usize,
    pub max_depth: usize,
    pub seed: Option<u64>,
    pub save_iterations: usize,
    pub log_stat_threshold: u32,
    pub log_stat_max_depth: usize,
    pub merge_rounds: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            max_depth: 15,
            seed: None,
            save_iterations: 20,
            log_stat_threshold: 10,
            log_stat_max_depth: 30,
            merge_rounds: 4,
        }
    }
}

impl PrepConfig {
    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => PrepConfig::from_file(path),
            None => Ok(PrepConfig::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: PrepConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition.max_vert_depth_lookup.is_empty() {
            return Err(PrepError::Config(
                "max_vert_depth_lookup needs at least one level".to_string(),
            ));
        }
        if self.partition.max_radius_island <= 0.0 {
            return Err(PrepError::Config(format!(
                "max_radius_island must be positive, got {}",
                self.partition.max_radius_island
            )));
        }
        if !(0.0..=1.0).contains(&self.contraction.contract_percent) {
            return Err(PrepError::Config(format!(
                "contract_percent must be within [0, 1], got {}",
                self.contraction.contract_percent
            )));
        }
        if self.contraction.max_witness_depth == 0 {
            return Err(PrepError::Config(
                "max_witness_depth must be at least 1".to_string(),
            ));
        }
        if self.store.batch_size == 0 {
            return Err(PrepError::Config("batch_size must be at least 1".to_string()));
        }
        if self.shortcuts.reload_every == 0 || self.diagnostics.save_iterations == 0 {
            return Err(PrepError::Config(
                "reload_every and save_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
