//! Square grid storage and cell access helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell's strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    #[default]
    Cooperate = 0,
    Defect = 1,
}

impl Action {
    /// Numeric form used by the payoff table and the dump format.
    #[inline]
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Action::bit`]; any non-zero value is a defector.
    #[inline]
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Action::Cooperate
        } else {
            Action::Defect
        }
    }
}

/// A `(row, col)` cell address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Self {
        Coord { row, col }
    }
}

/// A `size × size` row-major matrix.
///
/// Used for the action grid (`Grid<Action>`), the reward grid (`Grid<u32>`)
/// and the work grid holding next-step actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid<T> {
    size: usize,
    cells: Vec<T>,
}

pub type ActionGrid = Grid<Action>;
pub type RewardGrid = Grid<u32>;

impl<T: Copy> Grid<T> {
    /// Allocate a grid with every cell set to `fill`.
    pub fn filled(size: usize, fill: T) -> Self {
        Grid {
            size,
            cells: vec![fill; size * size],
        }
    }

    /// Build a grid from row-major cells. Returns `None` if the length is not `size²`.
    pub fn from_cells(size: usize, cells: Vec<T>) -> Option<Self> {
        if cells.len() != size * size {
            return None;
        }
        Some(Grid { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.cells[index_of(self.size, row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let idx = index_of(self.size, row, col);
        self.cells[idx] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        let start = row * self.size;
        &self.cells[start..start + self.size]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [T] {
        let start = row * self.size;
        let size = self.size;
        &mut self.cells[start..start + size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics; an empty grid simply has no rows.
        self.cells.chunks(self.size.max(1))
    }
}

/// Calculate the linear index for a 2D coordinate.
#[inline]
pub fn index_of(size: usize, row: usize, col: usize) -> usize {
    row * size + col
}

/// Check if signed coordinates are within grid bounds.
#[inline]
pub fn in_bounds(size: usize, row: isize, col: isize) -> bool {
    row >= 0 && col >= 0 && (row as usize) < size && (col as usize) < size
}

/// Cooperator and defector tallies for one committed grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    pub cooperators: usize,
    pub defectors: usize,
}

impl Census {
    /// Tally a slice of actions.
    pub fn of(actions: &[Action]) -> Self {
        let cooperators = actions.iter().filter(|&&a| a == Action::Cooperate).count();
        Census {
            cooperators,
            defectors: actions.len() - cooperators,
        }
    }

    /// Tally a flat buffer of action bits.
    pub fn of_bits(bits: &[u8]) -> Self {
        let cooperators = bits.iter().filter(|&&b| b == 0).count();
        Census {
            cooperators,
            defectors: bits.len() - cooperators,
        }
    }

    pub fn merge(self, other: Census) -> Census {
        Census {
            cooperators: self.cooperators + other.cooperators,
            defectors: self.defectors + other.defectors,
        }
    }

    pub fn total(&self) -> usize {
        self.cooperators + self.defectors
    }
}

impl fmt::Display for Census {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cooperates, {} defects",
            self.cooperators, self.defectors
        )
    }
}
