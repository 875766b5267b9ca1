//! Fan-in validation for per-row worker results.
//!
//! A phase is complete only when every row in `[0, size)` has been reported
//! exactly once with the right length. Results are staged here and copied into
//! the authoritative grid only after that check passes.

use crate::automaton::Grid;
use crate::error::{Phase, SimError};

#[derive(Debug)]
pub struct RowCollector<T> {
    phase: Phase,
    size: usize,
    /// Presence bitmap, one flag per row.
    seen: Vec<bool>,
    staged: Vec<Vec<T>>,
}

impl<T: Copy> RowCollector<T> {
    pub fn new(phase: Phase, size: usize) -> Self {
        RowCollector {
            phase,
            size,
            seen: vec![false; size],
            staged: (0..size).map(|_| Vec::new()).collect(),
        }
    }

    /// Stage one `(row, values)` result.
    pub fn accept(&mut self, row: usize, values: Vec<T>) -> Result<(), SimError> {
        if row >= self.size {
            return Err(SimError::InvalidRow {
                phase: self.phase,
                row,
                size: self.size,
            });
        }
        if self.seen[row] {
            return Err(SimError::DuplicateRow {
                phase: self.phase,
                row,
            });
        }
        if values.len() != self.size {
            return Err(SimError::RowLength {
                phase: self.phase,
                row,
                len: values.len(),
                expected: self.size,
            });
        }

        self.seen[row] = true;
        self.staged[row] = values;
        Ok(())
    }

    /// Rows not yet reported, ascending.
    pub fn missing(&self) -> Vec<usize> {
        self.seen
            .iter()
            .enumerate()
            .filter(|(_, &seen)| !seen)
            .map(|(row, _)| row)
            .collect()
    }

    /// Check completeness, then copy every staged row into `target`.
    pub fn finish_into(self, target: &mut Grid<T>) -> Result<(), SimError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(SimError::MissingRows {
                phase: self.phase,
                missing,
            });
        }
        if target.size() != self.size {
            return Err(SimError::InvalidConfig(format!(
                "{} phase: target grid is {}x{}, results are {}x{}",
                self.phase,
                target.size(),
                target.size(),
                self.size,
                self.size
            )));
        }

        for (row, values) in self.staged.into_iter().enumerate() {
            target.row_mut(row).copy_from_slice(&values);
        }
        Ok(())
    }
}
