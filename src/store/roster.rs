use std::sync::Arc;

use super::StoreError;
use crate::{
    config::Config,
    sheets::{Dimension, SheetsApi, a1::quote_sheet},
};

/// Checks (padrón, e-mail) pairs against the roster sheet.
pub struct RosterStore {
    /// Spreadsheet access.
    sheets:       Arc<dyn SheetsApi>,
    /// Roster worksheet title.
    sheet:        String,
    /// Header of the id column.
    id_column:    String,
    /// Header of the e-mail column.
    email_column: String,
}

impl RosterStore {
    /// Creates a store reading the roster sheet named in `config`.
    pub fn new(sheets: Arc<dyn SheetsApi>, config: &Config) -> Self {
        Self {
            sheets,
            sheet: config.roster_sheet.clone(),
            id_column: config.id_column.clone(),
            email_column: config.email_column.clone(),
        }
    }

    /// Whether some roster row has this id and e-mail, both compared
    /// case-insensitively. Rows missing either value are ignored.
    pub fn verify(&self, student_id: &str, email: &str) -> Result<bool, StoreError> {
        let roster = self
            .sheets
            .values(&quote_sheet(&self.sheet), Dimension::Rows)?;

        let student_id = student_id.to_lowercase();
        let email = email.to_lowercase();

        let found = roster.records().iter().any(|record| {
            let row_email = record
                .get(&self.email_column)
                .map(|value| value.trim())
                .unwrap_or_default();
            let row_id = record
                .get(&self.id_column)
                .map(String::as_str)
                .unwrap_or_default();

            !row_email.is_empty()
                && !row_id.is_empty()
                && row_id.to_lowercase() == student_id
                && row_email.to_lowercase() == email
        });

        tracing::info!("Roster verification for {student_id}: {found}");
        Ok(found)
    }
}
