//! Initial strategy assignments.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

use super::grid::{Action, ActionGrid};

/// The five initial layouts, identified by their numeric id in file names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Initializer {
    /// Each cell defects with probability one half.
    Random,
    /// Upper half cooperates, lower half defects.
    HalfSplit,
    /// Main diagonal defects.
    Diagonal,
    /// A single defector at `(size/2, size/2)`.
    CenterDefector,
    /// A single defector at `(1, 1)`, or `(0, 0)` on a 1×1 grid.
    NearOriginDefector,
}

impl Initializer {
    pub const ALL: [Initializer; 5] = [
        Initializer::Random,
        Initializer::HalfSplit,
        Initializer::Diagonal,
        Initializer::CenterDefector,
        Initializer::NearOriginDefector,
    ];

    /// The layouts whose output does not depend on a seed.
    pub const DETERMINISTIC: [Initializer; 4] = [
        Initializer::HalfSplit,
        Initializer::Diagonal,
        Initializer::CenterDefector,
        Initializer::NearOriginDefector,
    ];

    pub fn id(self) -> u8 {
        match self {
            Initializer::Random => 0,
            Initializer::HalfSplit => 1,
            Initializer::Diagonal => 2,
            Initializer::CenterDefector => 3,
            Initializer::NearOriginDefector => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Initializer::ALL.get(id as usize).copied()
    }

    pub fn is_random(self) -> bool {
        self == Initializer::Random
    }

    /// Build the initial grid. `seed` only affects [`Initializer::Random`];
    /// without one the random layout draws from OS entropy.
    pub fn initialize(self, size: usize, seed: Option<u64>) -> ActionGrid {
        let mut grid = ActionGrid::filled(size, Action::Cooperate);
        if size == 0 {
            return grid;
        }

        match self {
            Initializer::Random => {
                let mut rng = match seed {
                    Some(seed) => ChaCha12Rng::seed_from_u64(seed),
                    None => ChaCha12Rng::from_os_rng(),
                };
                for cell in grid.cells_mut() {
                    if rng.random::<f64>() >= 0.5 {
                        *cell = Action::Defect;
                    }
                }
            }
            Initializer::HalfSplit => {
                // row < size / 2 in real arithmetic
                for row in 0..size {
                    if row * 2 >= size {
                        grid.row_mut(row).fill(Action::Defect);
                    }
                }
            }
            Initializer::Diagonal => {
                for i in 0..size {
                    grid.set(i, i, Action::Defect);
                }
            }
            Initializer::CenterDefector => {
                grid.set(size / 2, size / 2, Action::Defect);
            }
            Initializer::NearOriginDefector => {
                if size > 1 {
                    grid.set(1, 1, Action::Defect);
                } else {
                    grid.set(0, 0, Action::Defect);
                }
            }
        }

        grid
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Initializer::Random => "random",
            Initializer::HalfSplit => "half-split",
            Initializer::Diagonal => "diagonal",
            Initializer::CenterDefector => "center-defector",
            Initializer::NearOriginDefector => "near-origin-defector",
        };
        write!(f, "{} ({})", name, self.id())
    }
}

impl FromStr for Initializer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("initializer id must be a number in 0..=4, got {s:?}"))?;
        Initializer::from_id(id).ok_or_else(|| format!("unknown initializer id {id}"))
    }
}
