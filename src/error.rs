//! Run-fatal simulation errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The fan-out/fan-in phase in which a worker result was checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Reward,
    Update,
    Count,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Reward => "reward",
            Phase::Update => "update",
            Phase::Count => "count",
        })
    }
}

/// Every variant aborts the run in progress; none is retried.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("{phase} phase: worker reported row {row}, outside [0, {size})")]
    InvalidRow {
        phase: Phase,
        row: usize,
        size: usize,
    },

    #[error("{phase} phase: row {row} reported more than once")]
    DuplicateRow { phase: Phase, row: usize },

    #[error("{phase} phase: rows never reported: {}", format_rows(.missing))]
    MissingRows { phase: Phase, missing: Vec<usize> },

    #[error("{phase} phase: row {row} has {len} cells, expected {expected}")]
    RowLength {
        phase: Phase,
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("{phase} phase: worker {worker} failed: {reason}")]
    WorkerFailure {
        phase: Phase,
        worker: usize,
        reason: String,
    },

    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render row indices compactly, collapsing consecutive runs: `0-3, 7, 9-10`.
pub fn format_rows(rows: &[usize]) -> String {
    let mut parts = Vec::new();
    let mut iter = rows.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }

    parts.join(", ")
}
