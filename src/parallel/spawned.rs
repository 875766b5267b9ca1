//! Per-step, per-phase worker threads with channel fan-in.
//!
//! Each phase starts one thread per row range and hands it its own copy of the
//! grids it reads. Workers stream `(row, values)` back through a bounded
//! channel; the driver validates every row through a [`RowCollector`] and joins
//! every worker before copying results into its grids. Threads of the next
//! phase are only started after that.

use std::ops::Range;
use std::sync::mpsc;
use std::thread;

use tracing::debug;

use super::collect::RowCollector;
use super::panic_message;
use super::partition::partition;
use crate::automaton::{reward_row, update_row, Action, ActionGrid, Census, Grid, RewardGrid};
use crate::engine::{effective_workers, BackendKind, Engine, StepReport};
use crate::error::{Phase, SimError};

pub struct SpawnedWorkerBackend {
    workers: usize,
}

impl SpawnedWorkerBackend {
    pub fn new(workers: usize) -> Self {
        SpawnedWorkerBackend {
            workers: workers.max(1),
        }
    }

    fn ranges(&self, size: usize) -> Vec<Range<usize>> {
        partition(size, effective_workers(self.workers, size))
    }
}

fn reward_kernel(actions: &ActionGrid, row: usize) -> Vec<u32> {
    reward_row(actions, row)
}

fn update_kernel(grids: &(ActionGrid, RewardGrid), row: usize) -> Vec<Action> {
    update_row(&grids.0, &grids.1, row)
}

fn count_kernel(actions: &ActionGrid, rows: Range<usize>) -> Census {
    rows.map(|row| Census::of(actions.row(row)))
        .fold(Census::default(), Census::merge)
}

/// Fan one phase out over `jobs`, each a row range plus the worker's own copy
/// of its inputs, and collect the validated rows.
fn fan_out_rows<P, T>(
    phase: Phase,
    size: usize,
    jobs: Vec<(Range<usize>, P)>,
    kernel: fn(&P, usize) -> Vec<T>,
) -> Result<RowCollector<T>, SimError>
where
    P: Send + 'static,
    T: Copy + Send + 'static,
{
    let workers = jobs.len();
    let (tx, rx) = mpsc::sync_channel::<(usize, Vec<T>)>(workers.max(1));
    let mut handles = Vec::with_capacity(workers);

    for (worker, (rows, payload)) in jobs.into_iter().enumerate() {
        let tx = tx.clone();
        let handle = thread::Builder::new()
            .name(format!("{phase}-worker-{worker}"))
            .spawn(move || {
                for row in rows {
                    // A closed channel means the driver already failed the phase.
                    if tx.send((row, kernel(&payload, row))).is_err() {
                        return;
                    }
                }
            })
            .map_err(|e| SimError::WorkerFailure {
                phase,
                worker,
                reason: e.to_string(),
            })?;
        handles.push(handle);
    }
    drop(tx);

    let mut collector = RowCollector::new(phase, size);
    let mut rejected = None;
    for (row, values) in rx.iter() {
        if let Err(err) = collector.accept(row, values) {
            rejected = Some(err);
            break;
        }
    }
    // Workers still sending see a closed channel and stop.
    drop(rx);

    let mut joined = Ok(());
    for (worker, handle) in handles.into_iter().enumerate() {
        if let Err(payload) = handle.join() {
            if joined.is_ok() {
                joined = Err(SimError::WorkerFailure {
                    phase,
                    worker,
                    reason: panic_message(payload.as_ref()),
                });
            }
        }
    }
    debug!(%phase, workers, "phase joined");

    if let Some(err) = rejected {
        return Err(err);
    }
    joined?;
    Ok(collector)
}

/// Fan the count phase out; each worker reports one partial census.
fn fan_out_counts(actions: &ActionGrid, ranges: &[Range<usize>]) -> Result<Census, SimError> {
    let phase = Phase::Count;
    let (tx, rx) = mpsc::sync_channel::<(usize, Census)>(ranges.len().max(1));
    let mut handles = Vec::with_capacity(ranges.len());

    for (worker, rows) in ranges.iter().cloned().enumerate() {
        let tx = tx.clone();
        let actions = actions.clone();
        let handle = thread::Builder::new()
            .name(format!("{phase}-worker-{worker}"))
            .spawn(move || {
                let _ = tx.send((worker, count_kernel(&actions, rows)));
            })
            .map_err(|e| SimError::WorkerFailure {
                phase,
                worker,
                reason: e.to_string(),
            })?;
        handles.push(handle);
    }
    drop(tx);

    let mut partials: Vec<Option<Census>> = vec![None; ranges.len()];
    for (worker, census) in rx {
        partials[worker] = Some(census);
    }

    for (worker, handle) in handles.into_iter().enumerate() {
        handle.join().map_err(|payload| SimError::WorkerFailure {
            phase,
            worker,
            reason: panic_message(payload.as_ref()),
        })?;
    }

    partials
        .into_iter()
        .enumerate()
        .try_fold(Census::default(), |total, (worker, partial)| {
            partial
                .map(|census| total.merge(census))
                .ok_or_else(|| SimError::WorkerFailure {
                    phase,
                    worker,
                    reason: "channel closed before a count was reported".to_string(),
                })
        })
}

impl Engine for SpawnedWorkerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Spawned
    }

    fn run(
        &mut self,
        actions: &mut ActionGrid,
        steps: usize,
        progress: &mut dyn FnMut(StepReport),
    ) -> Result<(), SimError> {
        let size = actions.size();
        let ranges = self.ranges(size);
        let mut rewards: RewardGrid = Grid::filled(size, 0);
        let mut work: ActionGrid = Grid::filled(size, Action::Cooperate);

        debug!(size, workers = ranges.len(), "spawned backend starting");

        for step in 0..steps {
            let jobs = ranges
                .iter()
                .map(|rows| (rows.clone(), actions.clone()))
                .collect();
            fan_out_rows(Phase::Reward, size, jobs, reward_kernel)?.finish_into(&mut rewards)?;

            let jobs = ranges
                .iter()
                .map(|rows| (rows.clone(), (actions.clone(), rewards.clone())))
                .collect();
            fan_out_rows(Phase::Update, size, jobs, update_kernel)?.finish_into(&mut work)?;

            std::mem::swap(actions, &mut work);

            let census = fan_out_counts(actions, &ranges)?;
            progress(StepReport { step, census });
        }

        Ok(())
    }
}
