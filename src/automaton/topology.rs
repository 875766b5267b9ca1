//! Open-boundary von Neumann neighborhood.

use super::grid::Coord;

/// In-bounds neighbors of one cell, at most four, in north/south/east/west order.
///
/// The order decides ties in the update pass: an earlier neighbor wins over a
/// later one with an equal reward.
#[derive(Clone, Copy, Debug)]
pub struct Neighbors {
    coords: [Coord; 4],
    len: usize,
}

impl Neighbors {
    fn push(&mut self, coord: Coord) {
        self.coords[self.len] = coord;
        self.len += 1;
    }

    pub fn as_slice(&self) -> &[Coord] {
        &self.coords[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<'a> IntoIterator for &'a Neighbors {
    type Item = &'a Coord;
    type IntoIter = std::slice::Iter<'a, Coord>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

/// Neighbors of `(row, col)` in a `size × size` grid, without wraparound.
#[inline]
pub fn neighbors(row: usize, col: usize, size: usize) -> Neighbors {
    let mut out = Neighbors {
        coords: [Coord::new(0, 0); 4],
        len: 0,
    };

    if row > 0 {
        out.push(Coord::new(row - 1, col));
    }
    if row + 1 < size {
        out.push(Coord::new(row + 1, col));
    }
    if col + 1 < size {
        out.push(Coord::new(row, col + 1));
    }
    if col > 0 {
        out.push(Coord::new(row, col - 1));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_order() {
        let n = neighbors(2, 2, 5);
        assert_eq!(
            n.as_slice(),
            &[
                Coord::new(1, 2), // north
                Coord::new(3, 2), // south
                Coord::new(2, 3), // east
                Coord::new(2, 1), // west
            ]
        );
    }

    #[test]
    fn test_corner_edge_interior_counts() {
        let size = 6;
        assert_eq!(neighbors(0, 0, size).len(), 2);
        assert_eq!(neighbors(0, size - 1, size).len(), 2);
        assert_eq!(neighbors(size - 1, 0, size).len(), 2);
        assert_eq!(neighbors(size - 1, size - 1, size).len(), 2);

        assert_eq!(neighbors(0, 3, size).len(), 3);
        assert_eq!(neighbors(3, 0, size).len(), 3);
        assert_eq!(neighbors(size - 1, 2, size).len(), 3);
        assert_eq!(neighbors(2, size - 1, size).len(), 3);

        for row in 1..size - 1 {
            for col in 1..size - 1 {
                assert_eq!(neighbors(row, col, size).len(), 4);
            }
        }
    }

    #[test]
    fn test_corner_keeps_order() {
        // (0,0): no north, no west
        let n = neighbors(0, 0, 3);
        assert_eq!(n.as_slice(), &[Coord::new(1, 0), Coord::new(0, 1)]);

        // (2,2): north then west
        let n = neighbors(2, 2, 3);
        assert_eq!(n.as_slice(), &[Coord::new(1, 2), Coord::new(2, 1)]);
    }

    #[test]
    fn test_single_cell_has_no_neighbors() {
        assert!(neighbors(0, 0, 1).is_empty());
    }
}
