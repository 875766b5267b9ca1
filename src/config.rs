//! Run and harness configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::automaton::Initializer;
use crate::engine::{effective_workers, BackendKind};
use crate::error::SimError;

pub const DEFAULT_GRID_SIZE: usize = 10;
pub const DEFAULT_STEPS: usize = 10;

/// Upper bound the harness applies to any requested worker count.
pub const MAX_HARNESS_WORKERS: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid harness configuration: {0}")]
    Invalid(String),
}

/// Hardware threads available to this process, at least 1.
pub fn available_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Everything one simulation run needs. Immutable for the duration of the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub grid_size: usize,
    pub steps: usize,
    pub initializer: Initializer,
    /// Requested workers; backends use at most `grid_size` of them.
    pub workers: usize,
    pub backend: BackendKind,
    /// Only affects the random initializer.
    pub seed: Option<u64>,
}

impl RunConfig {
    pub fn new(grid_size: usize, steps: usize, initializer: Initializer) -> Self {
        RunConfig {
            grid_size,
            steps,
            initializer,
            workers: available_workers(),
            backend: BackendKind::Sequential,
            seed: None,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.grid_size == 0 {
            return Err(SimError::InvalidConfig(
                "grid size must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(SimError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn effective_workers(&self) -> usize {
        match self.backend {
            BackendKind::Sequential => 1,
            _ => effective_workers(self.workers, self.grid_size),
        }
    }
}

/// Harness suite settings, optionally loaded from YAML. Missing keys keep
/// their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub quick_grid_size: usize,
    pub full_grid_size: usize,
    pub steps: usize,
    /// Worker counts checked for correctness (and, in full mode, speedup).
    pub correctness_workers: Vec<usize>,
    /// Worker counts measured in the full-mode speedup sweep.
    pub speedup_workers: Vec<usize>,
    pub max_workers: usize,
    /// Required speedup at every correctness worker count in full mode.
    pub min_speedup: f64,
    /// Speedup at least one swept worker count must reach in full mode.
    pub target_speedup: f64,
    pub initializers: Vec<u8>,
    /// When set, the random initializer is compared too.
    pub seed: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            quick_grid_size: 10,
            full_grid_size: 1024,
            steps: 20,
            correctness_workers: vec![2, 4],
            speedup_workers: vec![1, 2, 4, 8, 16],
            max_workers: MAX_HARNESS_WORKERS,
            min_speedup: 1.20,
            target_speedup: 4.00,
            initializers: vec![1, 2, 3, 4],
            seed: None,
        }
    }
}

impl HarnessConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = serde_yaml::from_str::<HarnessConfig>(&text);
        let config = parsed.map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quick_grid_size == 0 || self.full_grid_size == 0 {
            return Err(ConfigError::Invalid("grid sizes must be at least 1".into()));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if let Some(bad) = self
            .initializers
            .iter()
            .find(|&&id| Initializer::from_id(id).is_none())
        {
            return Err(ConfigError::Invalid(format!("unknown initializer id {bad}")));
        }
        Ok(())
    }

    /// Initializers whose dumps are compared. The random layout only joins
    /// when a seed makes it reproducible.
    pub fn compared_initializers(&self) -> Vec<Initializer> {
        let mut inits: Vec<Initializer> = self
            .initializers
            .iter()
            .filter_map(|&id| Initializer::from_id(id))
            .filter(|init| !init.is_random() || self.seed.is_some())
            .collect();
        if self.seed.is_some() && !inits.contains(&Initializer::Random) {
            inits.insert(0, Initializer::Random);
        }
        inits.sort();
        inits.dedup();
        inits
    }

    /// `max(1, min(requested, grid_size, max_workers, available))`
    pub fn cap_workers(&self, requested: usize, grid_size: usize, available: usize) -> usize {
        requested
            .min(grid_size)
            .min(self.max_workers)
            .min(available)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_validation() {
        let config = RunConfig::new(10, 10, Initializer::HalfSplit);
        assert!(config.validate().is_ok());

        let config = RunConfig::new(0, 10, Initializer::HalfSplit);
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));

        let config = RunConfig::new(4, 1, Initializer::HalfSplit).with_workers(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_run_config_effective_workers() {
        let config = RunConfig::new(3, 1, Initializer::Diagonal)
            .with_backend(BackendKind::Shared)
            .with_workers(16);
        assert_eq!(config.effective_workers(), 3);

        let config = config.with_backend(BackendKind::Sequential);
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn test_cap_workers() {
        let config = HarnessConfig::default();
        assert_eq!(config.cap_workers(4, 10, 8), 4);
        assert_eq!(config.cap_workers(16, 10, 64), 10);
        assert_eq!(config.cap_workers(32, 1024, 64), 16);
        assert_eq!(config.cap_workers(8, 1024, 2), 2);
        assert_eq!(config.cap_workers(0, 1024, 2), 1);
    }

    #[test]
    fn test_compared_initializers() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.compared_initializers(), Initializer::DETERMINISTIC.to_vec());

        config.seed = Some(5);
        let inits = config.compared_initializers();
        assert_eq!(inits.len(), 5);
        assert_eq!(inits[0], Initializer::Random);

        config.seed = None;
        config.initializers = vec![0, 2];
        assert_eq!(config.compared_initializers(), vec![Initializer::Diagonal]);
    }

    #[test]
    fn test_yaml_defaults_fill_missing_keys() {
        let config: HarnessConfig =
            serde_yaml::from_str("full_grid_size: 256\nmin_speedup: 1.5\n").unwrap();
        assert_eq!(config.full_grid_size, 256);
        assert_eq!(config.min_speedup, 1.5);
        assert_eq!(config.quick_grid_size, 10);
        assert_eq!(config.speedup_workers, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_load_rejects_unknown_initializer() {
        let name = format!("pd_harness_config_{}.yaml", std::process::id());
        let path = std::env::temp_dir().join(name);
        fs::write(&path, "initializers: [1, 9]\n").unwrap();

        let err = HarnessConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let err = HarnessConfig::load(Path::new("/nonexistent/pd_harness.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
