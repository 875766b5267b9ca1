//! Spatial Dilemma - iterated prisoner's dilemma on a square grid
//!
//! Every cell plays one action against its N/S/E/W neighbors, sums the
//! payoffs, then copies the action of the best-scoring cell in its
//! neighborhood. The sequential engine is the reference; the backends in
//! [`parallel`] must produce identical grids for any worker count.

pub mod automaton;
pub mod config;
pub mod dump;
pub mod engine;
pub mod error;
pub mod harness;
pub mod logging;
pub mod parallel;
pub mod sim;

pub use automaton::{Action, ActionGrid, Census, Initializer, RewardGrid, SequentialEngine};
pub use config::{HarnessConfig, RunConfig};
pub use engine::{BackendKind, Engine, StepReport};
pub use error::{Phase, SimError};
pub use logging::init_tracing;
pub use sim::{RunOutcome, Simulation};
