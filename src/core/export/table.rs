//! Row selection and cell evaluation shared by every output format

use super::field::{Cell, FieldPath};
use super::RowFilter;
use crate::core::entity::Record;
use crate::core::resolver::EntityResolver;

/// Evaluated rows ready for a writer
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Rows that passed the filter, including any beyond the cap
    pub total_rows: usize,
    pub failed_cells: usize,
}

impl Table {
    /// Filter and evaluate records
    ///
    /// With a cap, every record is still filtered so the total is exact, but
    /// only the first `cap` matching rows have their fields evaluated.
    pub fn build(
        records: &[&dyn Record],
        headers: Vec<String>,
        fields: &[FieldPath],
        filters: &[RowFilter],
        resolver: &EntityResolver,
        cap: Option<usize>,
    ) -> Self {
        let mut table = Table {
            headers,
            rows: Vec::new(),
            total_rows: 0,
            failed_cells: 0,
        };

        for record in records {
            if !filters.iter().all(|f| f.matches(*record, resolver)) {
                continue;
            }
            table.total_rows += 1;

            if cap.is_some_and(|cap| table.rows.len() >= cap) {
                continue;
            }

            let row: Vec<Cell> = fields
                .iter()
                .map(|field| field.evaluate(*record, resolver))
                .collect();
            table.failed_cells += row.iter().filter(|c| c.is_failed()).count();
            table.rows.push(row);
        }

        table
    }

    pub fn truncated(&self) -> bool {
        self.rows.len() < self.total_rows
    }

    /// Notice printed above a truncated table
    pub fn notice(&self) -> Option<String> {
        self.truncated()
            .then(|| format!("Showing first {} of {} rows", self.rows.len(), self.total_rows))
    }

    /// Rows rendered as text
    pub fn rendered_rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::render).collect())
    }
}
