use std::time::{Duration, Instant};

use log::info;

use crate::{config::MemoryConfig, error::Result, source::RoadGraphSource};

pub trait MemoryProbe {
    fn used_mb(&self) -> u64;
}

/// Resident set size read from `/proc/self/statm`. Reports 0 where the file
/// does not exist.
pub struct ProcessMemoryProbe;

const PAGE_SIZE: u64 = 4096;

impl MemoryProbe for ProcessMemoryProbe {
    fn used_mb(&self) -> u64 {
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| {
                statm
                    .split_whitespace()
                    .nth(1)
                    .and_then(|pages| pages.parse::<u64>().ok())
            })
            .map_or(0, |pages| pages * PAGE_SIZE / (1024 * 1024))
    }
}

/// Bounds memory of long phases by dropping and reopening the road graph
/// cache once usage passes the ceiling and the cooldown has elapsed.
pub struct MemoryGovernor {
    threshold_mb: u64,
    cooldown: Duration,
    last_reload: Option<Instant>,
    reloads: usize,
    probe: Box<dyn MemoryProbe>,
}

impl MemoryGovernor {
    pub fn new(config: &MemoryConfig) -> MemoryGovernor {
        MemoryGovernor::with_probe(config, Box::new(ProcessMemoryProbe))
    }

    pub fn with_probe(config: &MemoryConfig, probe: Box<dyn MemoryProbe>) -> MemoryGovernor {
        MemoryGovernor {
            threshold_mb: config.reload_threshold_mb,
            cooldown: Duration::from_secs(config.reload_cooldown_secs),
            last_reload: None,
            reloads: 0,
            probe,
        }
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    pub fn used_mb(&self) -> u64 {
        self.probe.used_mb()
    }

    fn cooled_down(&self) -> bool {
        self.last_reload
            .map_or(true, |last| last.elapsed() >= self.cooldown)
    }

    /// Reloads the source restricted to `files` when forced, or when memory
    /// is above the ceiling and the cooldown has passed. Returns whether a
    /// reload happened.
    pub fn maybe_reload(
        &mut self,
        source: &mut dyn RoadGraphSource,
        files: Option<&[String]>,
        force: bool,
    ) -> Result<bool> {
        let before = self.probe.used_mb();
        if !force && (before <= self.threshold_mb || !self.cooled_down()) {
            return Ok(false);
        }

        source.reload(files)?;
        self.last_reload = Some(Instant::now());
        self.reloads += 1;
        info!(
            "Reload memory used before {} MB - after reload {} MB",
            before,
            self.probe.used_mb()
        );
        Ok(true)
    }
}
