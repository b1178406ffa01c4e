//! Forward-series buffer: an append-once, lookback-by-offset store.
//!
//! One cell per bar in a single contiguous allocation. The cursor only moves
//! forward, the current cell is written at most once, and reads address cells
//! at or before the cursor. Together these make a value written at bar `j`
//! unobservable at any bar `i < j`.

use thiserror::Error;

use crate::value::NA;

/// Contract violations of a [`ForwardSeries`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("cell {index} is already written")]
    AlreadyWritten { index: usize },

    #[error("cursor {index} is outside capacity {capacity}")]
    OutOfBounds { index: usize, capacity: usize },

    #[error("cursor cannot advance past the last cell (capacity {capacity})")]
    CursorOverflow { capacity: usize },
}

#[derive(Debug, Clone)]
pub struct ForwardSeries {
    cells: Vec<f64>,
    cursor: usize,
    /// Highest index written so far. Writes only happen at the cursor, so the
    /// current cell is written iff this equals the cursor.
    written_through: Option<usize>,
}

impl ForwardSeries {
    /// Allocate `capacity` cells, all NA.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![NA; capacity],
            cursor: 0,
            written_through: None,
        }
    }

    /// Write the current cell.
    pub fn set(&mut self, value: f64) -> Result<(), SeriesError> {
        if self.cursor >= self.cells.len() {
            return Err(SeriesError::OutOfBounds {
                index: self.cursor,
                capacity: self.cells.len(),
            });
        }
        if self.written_through == Some(self.cursor) {
            return Err(SeriesError::AlreadyWritten { index: self.cursor });
        }
        self.cells[self.cursor] = value;
        self.written_through = Some(self.cursor);
        Ok(())
    }

    /// Value `offset` bars back from the cursor.
    ///
    /// NA when `offset` reaches before the first bar or the cell was never
    /// written. Offsets are unsigned, so a read can never address the future.
    pub fn get(&self, offset: usize) -> f64 {
        if offset > self.cursor {
            return NA;
        }
        self.cells.get(self.cursor - offset).copied().unwrap_or(NA)
    }

    /// Advance the cursor by one.
    pub fn next(&mut self) -> Result<(), SeriesError> {
        if self.cursor + 1 >= self.cells.len() {
            return Err(SeriesError::CursorOverflow {
                capacity: self.cells.len(),
            });
        }
        self.cursor += 1;
        Ok(())
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Whether the cell under the cursor has been written.
    pub fn is_written(&self) -> bool {
        self.written_through == Some(self.cursor)
    }

    /// Cells `0..=cursor`, the part of the series visible so far.
    pub fn history(&self) -> &[f64] {
        let end = (self.cursor + 1).min(self.cells.len());
        &self.cells[..end]
    }
}
