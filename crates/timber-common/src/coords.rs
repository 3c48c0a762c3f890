//! Coordinate types for the terrain grid.

use serde::{Deserialize, Serialize};

use crate::error::{TimberError, TimberResult};

/// Position of a tile in the terrain grid.
///
/// Rows run along the map's Y axis, columns along its X axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    /// Row (Y)
    pub row: usize,
    /// Column (X)
    pub col: usize,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Dimensions of a row-major grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    /// Number of rows (map height)
    pub rows: usize,
    /// Number of columns (map width)
    pub cols: usize,
}

impl GridDims {
    /// Creates grid dimensions.
    #[must_use]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells, saturating at `usize::MAX`.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Total number of cells, or `None` on overflow.
    #[must_use]
    pub const fn checked_len(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts a coordinate to a flat row-major index.
    pub fn index_of(&self, coord: GridCoord) -> TimberResult<usize> {
        if coord.row >= self.rows || coord.col >= self.cols {
            return Err(TimberError::Index {
                row: coord.row,
                col: coord.col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(coord.row * self.cols + coord.col)
    }

    /// Converts a flat row-major index back to a coordinate.
    #[must_use]
    pub const fn coord_of(&self, index: usize) -> GridCoord {
        GridCoord {
            row: index / self.cols,
            col: index % self.cols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        let dims = GridDims::new(3, 4);
        let idx = dims.index_of(GridCoord::new(2, 1)).expect("in bounds");
        assert_eq!(idx, 9);
        assert_eq!(dims.coord_of(idx), GridCoord::new(2, 1));
        assert_eq!(dims.len(), 12);
    }

    #[test]
    fn test_index_out_of_bounds() {
        let dims = GridDims::new(2, 2);
        assert!(matches!(
            dims.index_of(GridCoord::new(0, 2)),
            Err(TimberError::Index { col: 2, .. })
        ));
        assert!(dims.index_of(GridCoord::new(2, 0)).is_err());
    }

    #[test]
    fn test_len_does_not_overflow() {
        let dims = GridDims::new(usize::MAX, 2);
        assert_eq!(dims.checked_len(), None);
        assert_eq!(dims.len(), usize::MAX);
        assert_eq!(GridDims::new(3, 5).checked_len(), Some(15));
    }
}
