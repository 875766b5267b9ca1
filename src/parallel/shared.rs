//! Persistent pool stepping directly on flat shared buffers.
//!
//! Layout: three row-major `size * size` buffers (action bits, rewards, next
//! action bits) allocated once per run and addressed by `row * size + col`.
//!
//! Ownership invariant: during a phase each worker holds the only mutable
//! slice over its own row range of the buffer being written, cut with
//! `split_rows_mut` from the same `partition` ranges every phase. Everything
//! else is read-only for the phase. The commit (work -> action) and the census
//! happen on the driver thread after the pool scope has joined. Keep ranges
//! disjoint when touching the partitioning; nothing else guards these writes.

use std::ops::Range;

use tracing::debug;

use super::partition::{partition, split_rows_mut};
use super::{build_pool, catch_worker_panic};
use crate::automaton::{index_of, neighbors, payoff_bits, Action, ActionGrid, Census};
use crate::engine::{effective_workers, BackendKind, Engine, StepReport};
use crate::error::{Phase, SimError};

/// Flat integer buffers shared by the pool.
pub struct SharedArena {
    size: usize,
    action: Vec<u8>,
    reward: Vec<u32>,
    work: Vec<u8>,
}

impl SharedArena {
    pub fn new(size: usize) -> Self {
        let total = size * size;
        SharedArena {
            size,
            action: vec![0; total],
            reward: vec![0; total],
            work: vec![0; total],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        index_of(self.size, row, col)
    }

    pub fn reward(&self, row: usize, col: usize) -> u32 {
        self.reward[self.idx(row, col)]
    }

    /// Copy a grid into the action buffer.
    pub fn load(&mut self, grid: &ActionGrid) {
        if grid.size() != self.size {
            *self = SharedArena::new(grid.size());
        }
        for (slot, action) in self.action.iter_mut().zip(grid.cells()) {
            *slot = action.bit();
        }
    }

    /// Copy the action buffer back out into a grid.
    pub fn store(&self, grid: &mut ActionGrid) {
        for (cell, &bit) in grid.cells_mut().iter_mut().zip(&self.action) {
            *cell = Action::from_bit(bit);
        }
    }

    /// Make the work buffer current. The old actions end up in `work`, which
    /// the next update phase overwrites completely.
    fn commit(&mut self) {
        std::mem::swap(&mut self.action, &mut self.work);
    }

    pub fn census(&self) -> Census {
        Census::of_bits(&self.action)
    }
}

#[inline]
fn reward_cell(action: &[u8], size: usize, row: usize, col: usize) -> u32 {
    let own = action[index_of(size, row, col)];
    neighbors(row, col, size)
        .as_slice()
        .iter()
        .map(|n| payoff_bits(own, action[index_of(size, n.row, n.col)]))
        .sum()
}

#[inline]
fn update_cell(action: &[u8], reward: &[u32], size: usize, row: usize, col: usize) -> u8 {
    let idx = index_of(size, row, col);
    let mut best_reward = reward[idx];
    let mut best_action = action[idx];

    for n in &neighbors(row, col, size) {
        let nidx = index_of(size, n.row, n.col);
        if reward[nidx] > best_reward {
            best_reward = reward[nidx];
            best_action = action[nidx];
        }
    }

    best_action
}

/// Rewards for `rows`, written into `out` which holds exactly those rows.
pub fn reward_rows(action: &[u8], size: usize, rows: Range<usize>, out: &mut [u32]) {
    debug_assert_eq!(out.len(), rows.len() * size);
    for (offset, row) in rows.enumerate() {
        for col in 0..size {
            out[offset * size + col] = reward_cell(action, size, row, col);
        }
    }
}

/// Next actions for `rows`, written into `out` which holds exactly those rows.
pub fn update_rows(action: &[u8], reward: &[u32], size: usize, rows: Range<usize>, out: &mut [u8]) {
    debug_assert_eq!(out.len(), rows.len() * size);
    for (offset, row) in rows.enumerate() {
        for col in 0..size {
            out[offset * size + col] = update_cell(action, reward, size, row, col);
        }
    }
}

pub struct SharedMemoryBackend {
    thread_pool: rayon::ThreadPool,
    ranges: Vec<Range<usize>>,
    arena: SharedArena,
}

impl SharedMemoryBackend {
    pub fn new(grid_size: usize, workers: usize) -> Result<Self, SimError> {
        let workers = effective_workers(workers, grid_size);
        let thread_pool = build_pool(workers, "shared")?;
        Ok(SharedMemoryBackend {
            thread_pool,
            ranges: partition(grid_size, workers),
            arena: SharedArena::new(grid_size),
        })
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn arena(&self) -> &SharedArena {
        &self.arena
    }

    fn reward_phase(&mut self) -> Result<(), SimError> {
        let SharedArena {
            size,
            action,
            reward,
            ..
        } = &mut self.arena;
        let size = *size;
        let action: &[u8] = action;
        let chunks = split_rows_mut(reward, size, &self.ranges);
        let ranges = &self.ranges;
        let pool = &self.thread_pool;

        catch_worker_panic(Phase::Reward, || {
            pool.scope(|s| {
                for (rows, chunk) in ranges.iter().cloned().zip(chunks) {
                    s.spawn(move |_| reward_rows(action, size, rows, chunk));
                }
            })
        })
    }

    fn update_phase(&mut self) -> Result<(), SimError> {
        let SharedArena {
            size,
            action,
            reward,
            work,
        } = &mut self.arena;
        let size = *size;
        let action: &[u8] = action;
        let reward: &[u32] = reward;
        let chunks = split_rows_mut(work, size, &self.ranges);
        let ranges = &self.ranges;
        let pool = &self.thread_pool;

        catch_worker_panic(Phase::Update, || {
            pool.scope(|s| {
                for (rows, chunk) in ranges.iter().cloned().zip(chunks) {
                    s.spawn(move |_| update_rows(action, reward, size, rows, chunk));
                }
            })
        })
    }
}

impl Engine for SharedMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Shared
    }

    fn run(
        &mut self,
        actions: &mut ActionGrid,
        steps: usize,
        progress: &mut dyn FnMut(StepReport),
    ) -> Result<(), SimError> {
        let size = actions.size();
        if self.arena.size() != size {
            let workers = self.thread_pool.current_num_threads();
            self.ranges = partition(size, effective_workers(workers, size));
        }
        self.arena.load(actions);

        debug!(size, ranges = self.ranges.len(), "shared backend starting");

        for step in 0..steps {
            // pool.scope returns only once every spawned range has finished,
            // which is the barrier between phases.
            self.reward_phase()?;
            self.update_phase()?;

            self.arena.commit();
            let census = self.arena.census();
            progress(StepReport { step, census });
        }

        self.arena.store(actions);
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
            for workers in [1, 2, 3, 4, 8] {
                let mut expected = init.initialize(11, Some(9));
                let mut actual = expected.clone();

                let mut expected_reports = Vec::new();
                let mut actual_reports = Vec::new();
                SequentialEngine::new(11)
                    .run(&mut expected, 7, &mut |r| expected_reports.push(r))
                    .unwrap();
                SharedMemoryBackend::new(11, workers)
                    .unwrap()
                    .run(&mut actual, 7, &mut |r| actual_reports.push(r))
                    .unwrap();

                assert_eq!(expected, actual, "{init} with {workers} workers");
                assert_eq!(expected_reports, actual_reports);
            }
        }
    }

    #[test]
    fn test_load_store() {
        let grid = Initializer::Diagonal.initialize(4, None);
        let mut arena = SharedArena::new(4);
        arena.load(&grid);
        assert_eq!(arena.action[arena.idx(2, 2)], 1);
        assert_eq!(arena.action[arena.idx(2, 1)], 0);

        let mut out = ActionGrid::filled(4, Action::Defect);
        arena.store(&mut out);
        assert_eq!(out, grid);
    }

    #[test]
    fn test_flat_kernels_match_grid_kernels() {
        let grid = Initializer::Random.initialize(7, Some(1));
        let mut arena = SharedArena::new(7);
        arena.load(&grid);

        reward_rows(&arena.action, 7, 0..7, &mut arena.reward);
        for row in 0..7 {
            for col in 0..7 {
                assert_eq!(
                    arena.reward(row, col),
                    crate::automaton::reward_at(&grid, row, col)
                );
            }
        }
    }

    #[test]
    fn test_ranges_cover_rows_without_empties() {
        let backend = SharedMemoryBackend::new(3, 16).unwrap();
        assert_eq!(backend.ranges(), &[0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_center_defector_scenario() {
        let mut grid = Initializer::CenterDefector.initialize(3, None);
        let mut backend = SharedMemoryBackend::new(3, 2).unwrap();
        backend.run(&mut grid, 1, &mut |_| {}).unwrap();

        assert_eq!(backend.arena().reward(1, 1), 20);
        assert_eq!(backend.arena().reward(0, 1), 6);
        assert_eq!(backend.arena().reward(2, 2), 6);
        for (row, col) in [(0, 0), (0, 2), (2, 0), (2, 2)] {
            assert_eq!(grid.get(row, col), Action::Cooperate);
        }
        assert_eq!(Census::of(grid.cells()).defectors, 5);
    }
}
