//! Dense per-tile value grids.

use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use timber_common::{GridCoord, GridDims, TimberError, TimberResult};
use timber_save::{TerrainGrid, Tile};

/// A `rows`x`cols` grid of values, row-major.
///
/// Serialized as nested rows (`[[f64]]`), which is what the heatmaps read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>")]
pub struct Matrix {
    dims: GridDims,
    values: Vec<f64>,
}

impl Matrix {
    /// Derives one value per tile.
    ///
    /// Tiles are mapped in parallel; the output order always matches the grid.
    pub fn from_grid<F>(grid: &TerrainGrid, cell: F) -> Self
    where
        F: Fn(&Tile) -> f64 + Sync + Send,
    {
        Self {
            dims: grid.dims(),
            values: grid.tiles().par_iter().map(cell).collect(),
        }
    }

    /// Wraps row-major values.
    pub fn from_values(dims: GridDims, values: Vec<f64>) -> TimberResult<Self> {
        if values.len() != dims.len() {
            return Err(TimberError::corrupt(
                "matrix",
                format!(
                    "expected {} values for {}x{}, found {}",
                    dims.len(),
                    dims.rows,
                    dims.cols,
                    values.len()
                ),
            ));
        }
        Ok(Self { dims, values })
    }

    /// Grid dimensions.
    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at (`row`, `col`).
    pub fn get(&self, row: usize, col: usize) -> TimberResult<f64> {
        let index = self.dims.index_of(GridCoord::new(row, col))?;
        Ok(self.values[index])
    }

    /// Iterates rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.dims.cols.max(1))
    }

    /// Largest value, or `None` for an empty matrix.
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Sum of all values.
    ///
    /// Rows are summed in parallel and the row totals added in order, so the
    /// result does not depend on thread scheduling.
    #[must_use]
    pub fn sum(&self) -> f64 {
        sum_rows(&self.values, self.dims.cols)
    }
}

/// Row-partitioned sum with a sequential reduction.
pub(crate) fn sum_rows(values: &[f64], cols: usize) -> f64 {
    let row_totals: Vec<f64> = values
        .par_chunks(cols.max(1))
        .map(|row| row.iter().sum::<f64>())
        .collect();
    row_totals.iter().sum()
}

impl Serialize for Matrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = TimberError;

    fn try_from(rows: Vec<Vec<f64>>) -> TimberResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(row) = rows.iter().position(|r| r.len() != cols) {
            return Err(TimberError::corrupt(
                "matrix",
                format!("row {row} has {} values, expected {cols}", rows[row].len()),
            ));
        }
        let dims = GridDims::new(rows.len(), cols);
        Self::from_values(dims, rows.into_iter().flatten().collect())
    }
}
