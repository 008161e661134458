//! Result of one full spatial pooler + temporal memory step.

use crate::types::{CellIdx, ColumnIdx, UInt};

/// What a layer did in one cycle. All lists are sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeCycle {
    /// Columns chosen by the spatial pooler.
    pub active_columns: Vec<ColumnIdx>,
    /// Cells active this cycle.
    pub active_cells: Vec<CellIdx>,
    /// Cells selected to learn this cycle.
    pub winner_cells: Vec<CellIdx>,
    /// Cells predicted to become active next cycle.
    pub predictive_cells: Vec<CellIdx>,
}

impl ComputeCycle {
    /// Columns that contain at least one predictive cell.
    #[must_use]
    pub fn predicted_columns(&self, cells_per_column: UInt) -> Vec<ColumnIdx> {
        let mut columns: Vec<ColumnIdx> = self
            .predictive_cells
            .iter()
            .map(|&cell| cell / cells_per_column)
            .collect();
        columns.dedup();
        columns
    }

    /// Active columns in which every cell fired, i.e. nothing predicted them.
    #[must_use]
    pub fn bursting_columns(&self, cells_per_column: UInt) -> Vec<ColumnIdx> {
        self.active_columns
            .iter()
            .copied()
            .filter(|&column| {
                let first = column * cells_per_column;
                let lo = self.active_cells.partition_point(|&c| c < first);
                let hi = self.active_cells.partition_point(|&c| c < first + cells_per_column);
                (hi - lo) as UInt == cells_per_column
            })
            .collect()
    }
}
