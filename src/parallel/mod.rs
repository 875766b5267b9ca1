//! Parallel backends that must reproduce `SequentialEngine` bit for bit.
//!
//! Coordination is always driver-mediated fan-out/fan-in: workers never talk
//! to each other. Within a step the reward phase is fully validated for every
//! row before any update work starts, and a step commits before the next one
//! begins.
//!
//! No backend takes a lock. Write access is confined to disjoint row ranges
//! from [`partition`]; changing how ranges are cut must keep them disjoint.

pub mod collect;
pub mod partition;
pub mod shared;
pub mod snapshot;
pub mod spawned;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Phase, SimError};

pub use collect::RowCollector;
pub use partition::{partition, split_rows_mut};
pub use shared::{SharedArena, SharedMemoryBackend};
pub use snapshot::SnapshotPoolBackend;
pub use spawned::SpawnedWorkerBackend;

/// Build a persistent pool with `threads` workers named after `label`.
pub(crate) fn build_pool(
    threads: usize,
    label: &'static str,
) -> Result<rayon::ThreadPool, SimError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("{label}-{i}"))
        .build()?;
    Ok(pool)
}

/// Best-effort text of a worker panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Run a pool phase, turning a worker panic into [`SimError::WorkerFailure`].
///
/// Rayon re-raises worker panics on the calling thread; the pool does not
/// say which worker failed, so the failure is reported against worker 0.
pub(crate) fn catch_worker_panic<R>(phase: Phase, f: impl FnOnce() -> R) -> Result<R, SimError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| SimError::WorkerFailure {
        phase,
        worker: 0,
        reason: panic_message(payload.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_worker_panic() {
        let ok = catch_worker_panic(Phase::Reward, || 5).unwrap();
        assert_eq!(ok, 5);

        let err = catch_worker_panic(Phase::Update, || -> u32 { panic!("row kernel blew up") })
            .unwrap_err();
        match err {
            SimError::WorkerFailure { phase, reason, .. } => {
                assert_eq!(phase, Phase::Update);
                assert_eq!(reason, "row kernel blew up");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_pool_sizes() {
        let pool = build_pool(3, "test-pool").unwrap();
        assert_eq!(pool.current_num_threads(), 3);

        let pool = build_pool(0, "test-pool").unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }
}
