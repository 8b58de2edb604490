use std::sync::Arc;

use super::{StoreError, header_index};
use crate::{
    config::Config,
    sheets::{Dimension, SheetsApi, a1::quote_sheet},
};

/// Headers starting with this marker are kept in the sheet but never shown.
pub const COMMENT_MARKER: char = '_';

/// Reads a student's grade row from the grades sheet.
pub struct GradeStore {
    /// Spreadsheet access.
    sheets:    Arc<dyn SheetsApi>,
    /// Grades worksheet title.
    sheet:     String,
    /// Header of the id column.
    id_column: String,
}

impl GradeStore {
    /// Creates a store reading the grades sheet named in `config`.
    pub fn new(sheets: Arc<dyn SheetsApi>, config: &Config) -> Self {
        Self {
            sheets,
            sheet: config.grades_sheet.clone(),
            id_column: config.id_column.clone(),
        }
    }

    /// Returns `(header, value)` pairs of the first row whose id matches
    /// `student_id` case-insensitively, in sheet order, without comment
    /// columns.
    pub fn grades(&self, student_id: &str) -> Result<Vec<(String, String)>, StoreError> {
        let range = quote_sheet(&self.sheet);
        let table = self.sheets.values(&range, Dimension::Rows)?;

        let mut rows = table.values.iter();
        let headers = rows.next().cloned().unwrap_or_default();
        let id_index = header_index(&headers, &self.id_column, &range)?;

        let wanted = student_id.to_lowercase();
        let row = rows
            .find(|row| {
                row.get(id_index)
                    .is_some_and(|id| id.to_lowercase() == wanted)
            })
            .ok_or_else(|| StoreError::NotFound(student_id.to_string()))?;

        Ok(visible_fields(&headers, row))
    }
}

/// Zips headers with a row, padding short rows with `""` and dropping
/// comment columns.
fn visible_fields(headers: &[String], row: &[String]) -> Vec<(String, String)> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !header.starts_with(COMMENT_MARKER))
        .map(|(i, header)| (header.clone(), row.get(i).cloned().unwrap_or_default()))
        .collect()
}
