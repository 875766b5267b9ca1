//! Textual grid dumps.
//!
//! One line per row, row 0 first: `{row}: [a, b, ...]` with `0` for cooperate
//! and `1` for defect. Byte equality of two dumps is what the harness checks.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::automaton::{ActionGrid, Initializer};
use crate::error::SimError;

/// `output_grid{init}_{size}_{steps}_{tag}.txt`
pub fn dump_file_name(init: Initializer, size: usize, steps: usize, tag: &str) -> String {
    format!("output_grid{}_{}_{}_{}.txt", init.id(), size, steps, tag)
}

/// Render a grid in dump format.
pub fn render(grid: &ActionGrid) -> String {
    let mut out = String::with_capacity(grid.size() * (grid.size() * 3 + 8));

    for (i, row) in grid.rows().enumerate() {
        let _ = write!(out, "{i}: [");
        for (j, action) in row.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            out.push(if action.bit() == 0 { '0' } else { '1' });
        }
        out.push_str("]\n");
    }

    out
}

/// Write a dump to `dir`, returning its path.
///
/// The text goes to a temporary sibling first and is renamed into place, so an
/// interrupted write never leaves a truncated dump under the final name.
pub fn write_dump(
    dir: &Path,
    grid: &ActionGrid,
    init: Initializer,
    steps: usize,
    tag: &str,
) -> Result<PathBuf, SimError> {
    let path = dir.join(dump_file_name(init, grid.size(), steps, tag));
    let tmp = path.with_extension("txt.tmp");

    fs::write(&tmp, render(grid)).map_err(|source| SimError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| SimError::Io {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Action;

    #[test]
    fn test_file_name() {
        assert_eq!(
            dump_file_name(Initializer::HalfSplit, 10, 20, "seq"),
            "output_grid1_10_20_seq.txt"
        );
    }

    #[test]
    fn test_render() {
        let mut grid = ActionGrid::filled(3, Action::Cooperate);
        grid.set(1, 1, Action::Defect);
        grid.set(2, 0, Action::Defect);

        assert_eq!(render(&grid), "0: [0, 0, 0]\n1: [0, 1, 0]\n2: [1, 0, 0]\n");
    }

    #[test]
    fn test_render_single_cell() {
        let grid = ActionGrid::filled(1, Action::Defect);
        assert_eq!(render(&grid), "0: [1]\n");
    }

    #[test]
    fn test_write_dump() {
        let dir = std::env::temp_dir().join(format!("pd_dump_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let grid = Initializer::Diagonal.initialize(2, None);
        let path = write_dump(&dir, &grid, Initializer::Diagonal, 0, "seq").unwrap();

        assert_eq!(path.file_name().unwrap(), "output_grid2_2_0_seq.txt");
        assert_eq!(fs::read_to_string(&path).unwrap(), "0: [1, 0]\n1: [0, 1]\n");
        assert!(!path.with_extension("txt.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
