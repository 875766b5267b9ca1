//! Persistent pool stepping over an immutable per-step snapshot.
//!
//! Core invariant: both phases of a step read the same snapshot of the action
//! grid. The snapshot is the shared borrow of the driver's grid, so nothing can
//! mutate it until the commit after the update phase.

use rayon::prelude::*;
use tracing::debug;

use super::collect::RowCollector;
use super::{build_pool, catch_worker_panic};
use crate::automaton::{reward_row, update_row, Action, ActionGrid, Census, RewardGrid};
use crate::engine::{effective_workers, BackendKind, Engine, StepReport};
use crate::error::{Phase, SimError};

pub struct SnapshotPoolBackend {
    /// Lives for the whole run; workers are never respawned per step.
    thread_pool: rayon::ThreadPool,
    rewards: RewardGrid,
    work: ActionGrid,
}

impl SnapshotPoolBackend {
    pub fn new(grid_size: usize, workers: usize) -> Result<Self, SimError> {
        let thread_pool = build_pool(effective_workers(workers, grid_size), "snapshot")?;
        Ok(SnapshotPoolBackend {
            thread_pool,
            rewards: RewardGrid::filled(grid_size, 0),
            work: ActionGrid::filled(grid_size, Action::Cooperate),
        })
    }

    pub fn threads(&self) -> usize {
        self.thread_pool.current_num_threads()
    }

    /// One unit per row, each reading only `snapshot`.
    fn reward_phase(&mut self, snapshot: &ActionGrid) -> Result<(), SimError> {
        let size = snapshot.size();
        let rows: Vec<(usize, Vec<u32>)> = catch_worker_panic(Phase::Reward, || {
            self.thread_pool.install(|| {
                (0..size)
                    .into_par_iter()
                    .map(|row| (row, reward_row(snapshot, row)))
                    .collect()
            })
        })?;

        let mut collector = RowCollector::new(Phase::Reward, size);
        for (row, values) in rows {
            collector.accept(row, values)?;
        }
        collector.finish_into(&mut self.rewards)
    }

    /// One unit per row, each reading `snapshot` and the completed rewards.
    fn update_phase(&mut self, snapshot: &ActionGrid) -> Result<(), SimError> {
        let size = snapshot.size();
        let rewards = &self.rewards;
        let rows: Vec<(usize, Vec<Action>)> = catch_worker_panic(Phase::Update, || {
            self.thread_pool.install(|| {
                (0..size)
                    .into_par_iter()
                    .map(|row| (row, update_row(snapshot, rewards, row)))
                    .collect()
            })
        })?;

        let mut collector = RowCollector::new(Phase::Update, size);
        for (row, values) in rows {
            collector.accept(row, values)?;
        }
        collector.finish_into(&mut self.work)
    }
}

impl Engine for SnapshotPoolBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Snapshot
    }

    fn run(
        &mut self,
        actions: &mut ActionGrid,
        steps: usize,
        progress: &mut dyn FnMut(StepReport),
    ) -> Result<(), SimError> {
        let size = actions.size();
        if self.rewards.size() != size {
            self.rewards = RewardGrid::filled(size, 0);
            self.work = ActionGrid::filled(size, Action::Cooperate);
        }

        debug!(size, threads = self.threads(), "snapshot backend starting");

        for step in 0..steps {
            let snapshot: &ActionGrid = actions;
            self.reward_phase(snapshot)?;
            self.update_phase(snapshot)?;

            std::mem::swap(actions, &mut self.work);

            let census = Census::of(actions.cells());
            progress(StepReport { step, census });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{Initializer, SequentialEngine};

    #[test]
    fn test_matches_sequential() {
        for init in Initializer::ALL {
            for workers in [1, 2, 4] {
                let mut expected = init.initialize(12, Some(3));
                let mut actual = expected.clone();

                let mut expected_reports = Vec::new();
                let mut actual_reports = Vec::new();
                SequentialEngine::new(12)
                    .run(&mut expected, 8, &mut |r| expected_reports.push(r))
                    .unwrap();
                SnapshotPoolBackend::new(12, workers)
                    .unwrap()
                    .run(&mut actual, 8, &mut |r| actual_reports.push(r))
                    .unwrap();

                assert_eq!(expected, actual, "{init} with {workers} workers");
                assert_eq!(expected_reports, actual_reports);
            }
        }
    }

    #[test]
    fn test_pool_capped_by_grid_size() {
        let backend = SnapshotPoolBackend::new(3, 16).unwrap();
        assert_eq!(backend.threads(), 3);
    }

    #[test]
    fn test_rewards_come_from_snapshot() {
        // One step from a center defector must see the pre-step actions:
        // the center earns 4 * 5.
        let mut grid = Initializer::CenterDefector.initialize(3, None);
        let mut backend = SnapshotPoolBackend::new(3, 2).unwrap();
        backend.run(&mut grid, 1, &mut |_| {}).unwrap();

        assert_eq!(backend.rewards.get(1, 1), 20);
        assert_eq!(backend.rewards.get(0, 0), 6);
        assert_eq!(Census::of(grid.cells()).defectors, 5);
    }

    #[test]
    fn test_resizes_for_different_grid() {
        let mut backend = SnapshotPoolBackend::new(4, 2).unwrap();
        let mut grid = Initializer::Diagonal.initialize(6, None);
        let mut expected = grid.clone();

        backend.run(&mut grid, 3, &mut |_| {}).unwrap();
        SequentialEngine::new(6)
            .run(&mut expected, 3, &mut |_| {})
            .unwrap();
        assert_eq!(grid, expected);
    }
}
