//! Reference single-threaded stepping and the per-row kernels every backend shares.
//!
//! One step is four strictly ordered passes:
//! 1. reward: each cell sums its payoffs against its neighbors, reading only
//!    the actions at the start of the step;
//! 2. update: each cell adopts the action of whichever of itself or its
//!    neighbors earned the strictly highest reward (self wins ties, then
//!    earlier-listed neighbors);
//! 3. commit: the work grid replaces the action grid;
//! 4. count: cooperators and defectors are tallied for progress reporting.

use super::grid::{Action, ActionGrid, Census, RewardGrid};
use super::payoff::payoff;
use super::topology::neighbors;
use crate::engine::{BackendKind, Engine, StepReport};
use crate::error::SimError;

/// Total payoff of `(row, col)` against all of its neighbors.
#[inline]
pub fn reward_at(actions: &ActionGrid, row: usize, col: usize) -> u32 {
    let own = actions.get(row, col);
    neighbors(row, col, actions.size())
        .as_slice()
        .iter()
        .map(|n| payoff(own, actions.get(n.row, n.col)))
        .sum()
}

/// Next action of `(row, col)` by best-reward imitation.
///
/// Starts from the cell's own reward and action; a neighbor replaces the
/// current best only with a strictly greater reward.
#[inline]
pub fn update_at(actions: &ActionGrid, rewards: &RewardGrid, row: usize, col: usize) -> Action {
    let mut best_reward = rewards.get(row, col);
    let mut best_action = actions.get(row, col);

    for n in &neighbors(row, col, actions.size()) {
        let r = rewards.get(n.row, n.col);
        if r > best_reward {
            best_reward = r;
            best_action = actions.get(n.row, n.col);
        }
    }

    best_action
}

/// Fill `out` with the rewards of one row.
pub fn reward_row_into(actions: &ActionGrid, row: usize, out: &mut [u32]) {
    for (col, slot) in out.iter_mut().enumerate() {
        *slot = reward_at(actions, row, col);
    }
}

/// Fill `out` with the next actions of one row.
pub fn update_row_into(
    actions: &ActionGrid,
    rewards: &RewardGrid,
    row: usize,
    out: &mut [Action],
) {
    for (col, slot) in out.iter_mut().enumerate() {
        *slot = update_at(actions, rewards, row, col);
    }
}

pub fn reward_row(actions: &ActionGrid, row: usize) -> Vec<u32> {
    let mut out = vec![0; actions.size()];
    reward_row_into(actions, row, &mut out);
    out
}

pub fn update_row(actions: &ActionGrid, rewards: &RewardGrid, row: usize) -> Vec<Action> {
    let mut out = vec![Action::Cooperate; actions.size()];
    update_row_into(actions, rewards, row, &mut out);
    out
}

/// Ground-truth stepping. Owns the reward and work grids for a run.
pub struct SequentialEngine {
    rewards: RewardGrid,
    work: ActionGrid,
}

impl SequentialEngine {
    pub fn new(size: usize) -> Self {
        SequentialEngine {
            rewards: RewardGrid::filled(size, 0),
            work: ActionGrid::filled(size, Action::Cooperate),
        }
    }

    /// Rewards computed by the most recent step.
    pub fn rewards(&self) -> &RewardGrid {
        &self.rewards
    }

    /// Step the grid forward by one generation and tally the result.
    pub fn step(&mut self, actions: &mut ActionGrid) -> Census {
        let size = actions.size();
        if self.rewards.size() != size {
            *self = SequentialEngine::new(size);
        }

        for row in 0..size {
            reward_row_into(actions, row, self.rewards.row_mut(row));
        }

        for row in 0..size {
            update_row_into(actions, &self.rewards, row, self.work.row_mut(row));
        }

        // The old actions land in `work` and are fully overwritten next step.
        std::mem::swap(actions, &mut self.work);

        Census::of(actions.cells())
    }
}

impl Engine for SequentialEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequential
    }

    fn run(
        &mut self,
        actions: &mut ActionGrid,
        steps: usize,
        progress: &mut dyn FnMut(StepReport),
    ) -> Result<(), SimError> {
        for step in 0..steps {
            let census = self.step(actions);
            progress(StepReport { step, census });
        }
        Ok(())
    }
}
