//! Core automaton logic: grid storage, neighborhood, payoffs, initial layouts
//! and the reference stepping.
//!
//! The parallel backends in `parallel/` reuse the per-row kernels from
//! `stepping` so that every backend evaluates cells identically.

pub mod grid;
pub mod init;
pub mod payoff;
pub mod stepping;
pub mod topology;

pub use grid::{in_bounds, index_of, Action, ActionGrid, Census, Coord, Grid, RewardGrid};
pub use init::Initializer;
pub use payoff::{payoff, payoff_bits, PAYOFF};
pub use stepping::{
    reward_at, reward_row, reward_row_into, update_at, update_row, update_row_into,
    SequentialEngine,
};
pub use topology::{neighbors, Neighbors};
