//! The stepping seam shared by the reference engine and the parallel backends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::automaton::{ActionGrid, Census, SequentialEngine};
use crate::error::SimError;
use crate::parallel::{SharedMemoryBackend, SnapshotPoolBackend, SpawnedWorkerBackend};

/// Progress for one committed step, numbered from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub census: Census,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: {}", self.step, self.census)
    }
}

/// Which execution strategy steps the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single-threaded reference.
    Sequential,
    /// Fresh workers per step and phase, results through a bounded channel.
    Spawned,
    /// Persistent pool, per-row units over an immutable snapshot.
    Snapshot,
    /// Persistent pool over flat shared buffers.
    Shared,
}

impl BackendKind {
    pub const PARALLEL: [BackendKind; 3] = [
        BackendKind::Spawned,
        BackendKind::Snapshot,
        BackendKind::Shared,
    ];

    /// Suffix used in dump file names.
    pub fn tag(self) -> &'static str {
        match self {
            BackendKind::Sequential => "seq",
            BackendKind::Spawned => "spawned",
            BackendKind::Snapshot => "snapshot",
            BackendKind::Shared => "shared",
        }
    }

    /// Build an engine for a `grid_size` grid. `workers` is ignored by the
    /// sequential engine and capped at `grid_size` by the others.
    pub fn build(self, grid_size: usize, workers: usize) -> Result<Box<dyn Engine>, SimError> {
        Ok(match self {
            BackendKind::Sequential => Box::new(SequentialEngine::new(grid_size)),
            BackendKind::Spawned => Box::new(SpawnedWorkerBackend::new(workers)),
            BackendKind::Snapshot => Box::new(SnapshotPoolBackend::new(grid_size, workers)?),
            BackendKind::Shared => Box::new(SharedMemoryBackend::new(grid_size, workers)?),
        })
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Sequential => "sequential",
            BackendKind::Spawned => "spawned",
            BackendKind::Snapshot => "snapshot",
            BackendKind::Shared => "shared",
        })
    }
}

/// Advances an action grid through whole steps.
///
/// Implementations must reproduce [`SequentialEngine`] exactly: every update
/// observes the rewards of all cells, and every reward observes the actions
/// from the start of its step.
pub trait Engine {
    fn kind(&self) -> BackendKind;

    /// Run `steps` steps in place, reporting after each commit.
    fn run(
        &mut self,
        actions: &mut ActionGrid,
        steps: usize,
        progress: &mut dyn FnMut(StepReport),
    ) -> Result<(), SimError>;
}

/// Worker count a backend actually uses on a `grid_size` grid.
pub fn effective_workers(requested: usize, grid_size: usize) -> usize {
    requested.min(grid_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_report_line() {
        let report = StepReport {
            step: 3,
            census: Census {
                cooperators: 91,
                defectors: 9,
            },
        };
        assert_eq!(report.to_string(), "step 3: 91 cooperates, 9 defects");
    }

    #[test]
    fn test_effective_workers() {
        assert_eq!(effective_workers(16, 3), 3);
        assert_eq!(effective_workers(0, 3), 1);
        assert_eq!(effective_workers(4, 100), 4);
        assert_eq!(effective_workers(4, 0), 1);
    }

    #[test]
    fn test_build_reports_kind() {
        for kind in [
            BackendKind::Sequential,
            BackendKind::Spawned,
            BackendKind::Snapshot,
            BackendKind::Shared,
        ] {
            let engine = kind.build(4, 2).unwrap();
            assert_eq!(engine.kind(), kind);
        }
    }

    #[test]
    fn test_tags_are_distinct() {
        let mut tags: Vec<_> = [
            BackendKind::Sequential,
            BackendKind::Spawned,
            BackendKind::Snapshot,
            BackendKind::Shared,
        ]
        .iter()
        .map(|k| k.tag())
        .collect();
        tags.dedup();
        assert_eq!(tags.len(), 4);
    }
}
