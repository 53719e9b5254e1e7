//! Grid partitioning
//!
//! Splits a screenshot into a `columns x rows` array of equal character
//! cells, optionally restricted to a crop rectangle.

use serde::{Deserialize, Serialize};

use crate::error::{OcrError, Result};

/// Text grid dimensions requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Character columns
    pub columns: u32,
    /// Character rows
    pub rows: u32,
}

impl GridSpec {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        // Classic VGA text mode
        Self { columns: 80, rows: 25 }
    }
}

/// Inclusive, 0-based crop rectangle in cell coordinates
///
/// Bounds are signed so that negative requests from callers are rejected
/// rather than wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub start_row: i32,
    pub end_row: i32,
    pub start_col: i32,
    pub end_col: i32,
}

impl CropRect {
    pub fn new(start_row: i32, end_row: i32, start_col: i32, end_col: i32) -> Self {
        Self {
            start_row,
            end_row,
            start_col,
            end_col,
        }
    }
}

/// One cell position within the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    /// Column in the full grid
    pub column: u32,
    /// Row in the full grid
    pub row: u32,
    /// Pixel x of the cell's top-left corner
    pub x: u32,
    /// Pixel y of the cell's top-left corner
    pub y: u32,
}

/// Computed cell geometry for one image and grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLayout {
    /// Cell width in pixels
    pub cell_width: u32,
    /// Cell height in pixels
    pub cell_height: u32,
    /// Full grid requested
    pub grid: GridSpec,
    /// First column iterated
    pub first_column: u32,
    /// First row iterated
    pub first_row: u32,
    /// Number of columns iterated
    pub columns: u32,
    /// Number of rows iterated
    pub rows: u32,
}

impl CellLayout {
    /// Compute cell geometry, validating the grid and optional crop
    ///
    /// All validation happens here, before any pixel is read.
    pub fn new(width: u32, height: u32, grid: GridSpec, crop: Option<CropRect>) -> Result<Self> {
        let cell_width = width.checked_div(grid.columns).unwrap_or(0);
        let cell_height = height.checked_div(grid.rows).unwrap_or(0);

        if cell_width == 0 || cell_height == 0 {
            return Err(OcrError::InvalidGrid {
                columns: grid.columns,
                rows: grid.rows,
                width,
                height,
                cell_width,
                cell_height,
            });
        }

        let (first_row, rows, first_column, columns) = match crop {
            None => (0, grid.rows, 0, grid.columns),
            Some(crop) => {
                let (r0, rows) = validate_range("row", crop.start_row, crop.end_row, grid.rows)?;
                let (c0, columns) =
                    validate_range("column", crop.start_col, crop.end_col, grid.columns)?;
                (r0, rows, c0, columns)
            }
        };

        Ok(Self {
            cell_width,
            cell_height,
            grid,
            first_column,
            first_row,
            columns,
            rows,
        })
    }

    /// Number of cells iterated
    pub fn cell_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Position of the `index`-th cell in row-major order
    pub fn position(&self, index: usize) -> CellPosition {
        let column = self.first_column + (index % self.columns as usize) as u32;
        let row = self.first_row + (index / self.columns as usize) as u32;
        CellPosition {
            column,
            row,
            x: column * self.cell_width,
            y: row * self.cell_height,
        }
    }

    /// Iterate cell positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = CellPosition> + '_ {
        (0..self.cell_count()).map(move |i| self.position(i))
    }
}

/// Check an inclusive range against `[0, limit)`; returns (start, length)
fn validate_range(axis: &str, start: i32, end: i32, limit: u32) -> Result<(u32, u32)> {
    if start < 0 || end < 0 {
        return Err(OcrError::CropRange(format!(
            "{} range {}..{} has a negative bound",
            axis, start, end
        )));
    }
    if start > end {
        return Err(OcrError::CropRange(format!(
            "{} range {}..{} is inverted",
            axis, start, end
        )));
    }
    if end as u32 >= limit {
        return Err(OcrError::CropRange(format!(
            "{} range {}..{} exceeds grid size {}",
            axis, start, end, limit
        )));
    }

    // start <= end, so at least one cell is selected
    Ok((start as u32, (end - start + 1) as u32))
}
