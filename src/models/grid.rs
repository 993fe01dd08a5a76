use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A (row, column) coordinate on a [`Grid`].
///
/// Positions are the identity key of search nodes: two nodes at the same
/// position are the same node regardless of their accumulated cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Apply a signed offset, returning `None` if either coordinate would go negative.
    pub fn offset(self, d_row: isize, d_col: isize) -> Option<Position> {
        Some(Position {
            row: self.row.checked_add_signed(d_row)?,
            col: self.col.checked_add_signed(d_col)?,
        })
    }

    pub fn manhattan(self, other: Position) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    pub fn chebyshev(self, other: Position) -> usize {
        self.row.abs_diff(other.row).max(self.col.abs_diff(other.col))
    }

    pub fn euclidean(self, other: Position) -> f64 {
        let dr = self.row.abs_diff(other.row) as f64;
        let dc = self.col.abs_diff(other.col) as f64;
        (dr * dr + dc * dc).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Occupancy of a single grid cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Cell {
    #[default]
    Free,
    Blocked,
}

impl Cell {
    pub fn is_free(self) -> bool {
        self == Cell::Free
    }
}

/// Neighbourhood used when moving between cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Orthogonal moves only, each costing 1
    #[default]
    Four,
    /// Orthogonal moves cost 1, diagonal moves cost √2
    Eight,
}

const ORTHOGONAL: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const DIAGONAL: [(isize, isize); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

impl Connectivity {
    /// Neighbour offsets as `(d_row, d_col, step_cost)`.
    pub fn moves(self) -> impl Iterator<Item = (isize, isize, f64)> {
        let diagonals: &'static [(isize, isize)] = match self {
            Connectivity::Four => &[],
            Connectivity::Eight => &DIAGONAL,
        };
        ORTHOGONAL
            .iter()
            .map(|&(dr, dc)| (dr, dc, 1.0))
            .chain(diagonals.iter().map(|&(dr, dc)| (dr, dc, std::f64::consts::SQRT_2)))
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Four => write!(f, "4-connected"),
            Connectivity::Eight => write!(f, "8-connected"),
        }
    }
}

/// Errors raised by grid construction and cell access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Grid dimensions must be non-zero, got {rows}x{cols}")]
    EmptyDimensions { rows: usize, cols: usize },

    #[error("Position {position} is outside the {rows}x{cols} grid")]
    OutOfBounds {
        position: Position,
        rows: usize,
        cols: usize,
    },

    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unknown cell character {0:?} (use '.' for free and '#' for blocked)")]
    InvalidCell(char),
}

/// Fixed-size 2D occupancy grid stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create an all-free grid
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyDimensions { rows, cols });
        }
        Ok(Self {
            rows,
            cols,
            cells: vec![Cell::Free; rows * cols],
        })
    }

    /// Parse a grid from text, one line per row: `.` is free, `#` is blocked.
    ///
    /// Blank lines and surrounding whitespace are ignored.
    pub fn parse(text: &str) -> Result<Self, GridError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let rows = lines.len();
        let cols = lines.first().map(|l| l.chars().count()).unwrap_or(0);
        let mut grid = Grid::new(rows, cols)?;

        for (row, line) in lines.iter().enumerate() {
            let found = line.chars().count();
            if found != cols {
                return Err(GridError::RaggedRow {
                    row,
                    expected: cols,
                    found,
                });
            }
            for (col, ch) in line.chars().enumerate() {
                let cell = match ch {
                    '.' => Cell::Free,
                    '#' => Cell::Blocked,
                    other => return Err(GridError::InvalidCell(other)),
                };
                grid.cells[row * cols + col] = cell;
            }
        }

        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, position: Position) -> bool {
        position.row < self.rows && position.col < self.cols
    }

    /// Return an error unless `position` lies inside the grid
    pub fn check_bounds(&self, position: Position) -> Result<(), GridError> {
        if self.contains(position) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                position,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    pub fn get(&self, position: Position) -> Option<Cell> {
        self.contains(position)
            .then(|| self.cells[position.row * self.cols + position.col])
    }

    /// True when `position` is inside the grid and not blocked
    pub fn is_free(&self, position: Position) -> bool {
        self.get(position).is_some_and(Cell::is_free)
    }

    pub fn is_blocked(&self, position: Position) -> bool {
        self.get(position) == Some(Cell::Blocked)
    }

    pub fn set(&mut self, position: Position, cell: Cell) -> Result<(), GridError> {
        self.check_bounds(position)?;
        self.cells[position.row * self.cols + position.col] = cell;
        Ok(())
    }

    pub fn block(&mut self, position: Position) -> Result<(), GridError> {
        self.set(position, Cell::Blocked)
    }

    /// Reset every cell to free
    pub fn clear(&mut self) {
        self.cells.fill(Cell::Free);
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_free()).count()
    }

    /// All positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Position { row, col }))
    }

    pub fn free_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions().filter(|&p| self.is_free(p))
    }

    /// In-bounds, free neighbours of `position` with their step cost.
    pub fn neighbors(
        &self,
        position: Position,
        connectivity: Connectivity,
    ) -> impl Iterator<Item = (Position, f64)> + '_ {
        connectivity.moves().filter_map(move |(dr, dc, cost)| {
            position
                .offset(dr, dc)
                .filter(|&next| self.is_free(next))
                .map(|next| (next, cost))
        })
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let ch = match self.cells[row * self.cols + col] {
                    Cell::Free => '.',
                    Cell::Blocked => '#',
                };
                write!(f, "{}", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
