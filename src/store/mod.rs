//! Repositories over the course spreadsheet.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Per-student grade rows.
pub mod grades;
/// Group grade notifications for an assignment.
pub mod groups;
/// Roster verification.
pub mod roster;

pub use grades::GradeStore;
pub use groups::{Group, GroupNotificationStore};
pub use roster::RosterStore;
use thiserror::Error;

use crate::{credentials::AuthError, sheets::SheetsError};

/// Cell values that count as "nothing here": not-applicable, broken reference,
/// empty and zero.
pub const PLACEHOLDERS: [&str; 4] = ["#N/A", "#REF!", "", "0"];

/// Whether `value` is one of the [`PLACEHOLDERS`], ignoring surrounding
/// whitespace.
pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&value.trim())
}

/// Errors raised by the stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No row for the requested student. A normal outcome for user input.
    #[error("Padrón {0} no encontrado")]
    NotFound(String),
    /// A named range (the group e-mails or an assignment) does not exist.
    #[error("No range named `{0}` exists in the spreadsheet")]
    RangeNotFound(String),
    /// An expected header is absent.
    #[error("Column `{column}` not found in `{range}`")]
    MissingColumn {
        /// Header that was looked up.
        column: String,
        /// Range it was looked up in.
        range:  String,
    },
    /// No spreadsheet token could be obtained.
    #[error(transparent)]
    Unauthorized(AuthError),
    /// Any other spreadsheet failure.
    #[error(transparent)]
    Sheets(SheetsError),
}

impl From<SheetsError> for StoreError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::RangeNotFound(range) => StoreError::RangeNotFound(range),
            SheetsError::Unauthorized(auth) => StoreError::Unauthorized(auth),
            other => StoreError::Sheets(other),
        }
    }
}

/// Position of `column` in `headers`, or `MissingColumn`.
pub(crate) fn header_index(
    headers: &[String],
    column: &str,
    range: &str,
) -> Result<usize, StoreError> {
    headers
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| StoreError::MissingColumn {
            column: column.to_string(),
            range:  range.to_string(),
        })
}
