//! Owned 2-D lattice of cell states.
//! Cells are stored row-major; the shape is fixed at construction.

use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// A single cell state code.
pub type Cell = u8;

/// Integer row/column coordinate of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    EmptyShape,
    Ragged { row: usize, expected: usize, actual: usize },
    DataLength { expected: usize, actual: usize },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::EmptyShape => write!(f, "grid must have at least one row and one column"),
            GridError::Ragged {
                row,
                expected,
                actual,
            } => write!(f, "row {row} has {actual} cells, expected {expected}"),
            GridError::DataLength { expected, actual } => {
                write!(f, "grid data has {actual} cells, shape requires {expected}")
            }
        }
    }
}

impl Error for GridError {}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<Cell>,
}

impl Grid {
    /// Create a grid of the given shape with every cell set to `fill`.
    pub fn filled(rows: usize, cols: usize, fill: Cell) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyShape);
        }
        Ok(Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        })
    }

    /// Wrap row-major cell data of the given shape.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<Cell>) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyShape);
        }
        if data.len() != rows * cols {
            return Err(GridError::DataLength {
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a grid from nested rows; all rows must have the same length.
    pub fn from_rows<R: AsRef<[Cell]>>(rows: &[R]) -> Result<Self, GridError> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(GridError::EmptyShape);
        }
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (row, cells) in rows.iter().enumerate() {
            let cells = cells.as_ref();
            if cells.len() != cols {
                return Err(GridError::Ragged {
                    row,
                    expected: cols,
                    actual: cells.len(),
                });
            }
            data.extend_from_slice(cells);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[Cell] {
        &self.data
    }

    pub fn contains_position(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Cell at `pos`. Panics when `pos` is out of bounds.
    #[inline]
    pub fn get(&self, pos: Position) -> Cell {
        assert!(self.contains_position(pos), "position {pos} out of bounds");
        self.data[pos.row * self.cols + pos.col]
    }

    /// Cell at a signed coordinate, or `None` outside the grid.
    #[inline]
    pub fn get_signed(&self, row: isize, col: isize) -> Option<Cell> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.data[row * self.cols + col])
    }

    /// Overwrite the cell at `pos`. Panics when `pos` is out of bounds.
    #[inline]
    pub fn set(&mut self, pos: Position, value: Cell) {
        assert!(self.contains_position(pos), "position {pos} out of bounds");
        self.data[pos.row * self.cols + pos.col] = value;
    }

    /// Row-major iterator over `(position, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Position, Cell)> + '_ {
        let cols = self.cols;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, &v)| (Position::new(i / cols, i % cols), v))
    }

    /// Number of cells holding `value`.
    pub fn count(&self, value: Cell) -> usize {
        self.data.iter().filter(|&&v| v == value).count()
    }

    /// Per-value cell counts, in the order of `values`.
    pub fn histogram(&self, values: &[Cell]) -> Vec<usize> {
        let mut table = [0usize; 256];
        for &v in &self.data {
            table[v as usize] += 1;
        }
        values.iter().map(|&v| table[v as usize]).collect()
    }

    /// Wrap data whose shape the caller has already checked.
    pub(crate) fn from_raw(rows: usize, cols: usize, data: Vec<Cell>) -> Self {
        debug_assert!(rows > 0 && cols > 0 && data.len() == rows * cols);
        Self { rows, cols, data }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [Cell] {
        &mut self.data
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.chunks(self.cols) {
            let line: Vec<String> = row.iter().map(|v| format!("{v:>3}")).collect();
            writeln!(f, "{}", line.join(""))?;
        }
        Ok(())
    }
}
