/*
 * tables.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Row and cell bookkeeping for the tables being rendered.
//!
//! Cell repetition and removal change how many cells a row ends up with.
//! The tracker follows the table, row and cell tags as they are written so
//! that loops over cells can start new rows when one is full and pad the
//! last row up to the declared column count.

use crate::element::ElementKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableState {
    /// Declared column count; 0 when the table declares none.
    pub columns: usize,
    /// Cells written so far in the current row.
    pub cells_in_row: usize,
}

impl TableState {
    pub fn row_is_full(&self) -> bool {
        self.columns > 0 && self.cells_in_row >= self.columns
    }

    /// Cells still missing from the current row.
    pub fn missing_cells(&self) -> usize {
        self.columns.saturating_sub(self.cells_in_row)
    }
}

#[derive(Debug, Default)]
pub struct TableTracker {
    stack: Vec<TableState>,
}

impl TableTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// An element tag was written.
    pub fn on_open(&mut self, kind: ElementKind, columns: Option<usize>) {
        match kind {
            ElementKind::Table => self.stack.push(TableState {
                columns: columns.unwrap_or(0),
                cells_in_row: 0,
            }),
            ElementKind::Row => self.start_new_row(),
            ElementKind::Cell => self.note_cell(),
            _ => {}
        }
    }

    /// An element's close tag was written.
    pub fn on_close(&mut self, kind: ElementKind) {
        if kind == ElementKind::Table {
            self.stack.pop();
        }
    }

    /// A cell was written outside the template's own markup.
    pub fn note_cell(&mut self) {
        if let Some(table) = self.stack.last_mut() {
            table.cells_in_row += 1;
        }
    }

    pub fn start_new_row(&mut self) {
        if let Some(table) = self.stack.last_mut() {
            table.cells_in_row = 0;
        }
    }

    /// The innermost table being rendered.
    pub fn current(&self) -> Option<TableState> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_cells_per_row() {
        let mut tracker = TableTracker::new();
        tracker.on_open(ElementKind::Table, Some(3));
        tracker.on_open(ElementKind::Row, None);
        tracker.on_open(ElementKind::Cell, None);
        tracker.on_open(ElementKind::Cell, None);
        assert_eq!(
            tracker.current(),
            Some(TableState {
                columns: 3,
                cells_in_row: 2
            })
        );
        assert_eq!(tracker.current().unwrap().missing_cells(), 1);
        tracker.on_open(ElementKind::Row, None);
        assert_eq!(tracker.current().unwrap().cells_in_row, 0);
    }

    #[test]
    fn test_nested_tables_are_independent() {
        let mut tracker = TableTracker::new();
        tracker.on_open(ElementKind::Table, Some(2));
        tracker.on_open(ElementKind::Row, None);
        tracker.on_open(ElementKind::Cell, None);
        tracker.on_open(ElementKind::Table, None);
        assert_eq!(tracker.depth(), 2);
        assert!(!tracker.current().unwrap().row_is_full());
        tracker.on_close(ElementKind::Table);
        assert_eq!(tracker.current().unwrap().cells_in_row, 1);
    }

    #[test]
    fn test_cells_outside_tables_are_ignored() {
        let mut tracker = TableTracker::new();
        tracker.note_cell();
        assert_eq!(tracker.current(), None);
    }
}
