use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use typed_builder::TypedBuilder;

use super::{StoreError, header_index, is_placeholder};
use crate::{
    config::{Config, GroupColumns},
    sheets::{
        Dimension, SheetsApi, ValueRange,
        a1::{CellRef, RangeStart},
    },
};

/// Value written into the notified column once a group has been e-mailed.
pub const NOTIFIED_MARKER: &str = "TRUE";

/// One group's row for an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Group {
    /// Group number as written in the sheet.
    pub number:        String,
    /// One address per member.
    pub emails:        Vec<String>,
    /// Who corrected the submission.
    #[builder(default)]
    pub corrector:     String,
    /// Grade as written in the sheet.
    #[builder(default)]
    pub grade:         String,
    /// Feedback text.
    #[builder(default)]
    pub feedback:      String,
    /// Current notified marker (a placeholder for pending groups).
    #[builder(default)]
    pub notified:      String,
    /// Absolute address of this group's notified cell.
    #[serde(skip)]
    pub notified_cell: CellRef,
}

/// Builds the named-range key of an assignment: `prefix` followed by every
/// word of `assignment` with its first letter upper-cased, without
/// separators. `None` when the assignment has no words.
pub fn assignment_range_key(prefix: &str, assignment: &str) -> Option<String> {
    let mut words = assignment.split_whitespace().peekable();
    words.peek()?;

    let suffix: String = words
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    Some(format!("{prefix}{suffix}"))
}

/// Joins two column-major blocks row by row.
///
/// Headers are the first cell of every column. Row `i` is the concatenation
/// of each block's cells at index `i + 1`, each block padded with `""` to its
/// own width, so every row is as wide as the header.
pub(crate) fn merge_column_blocks(
    left: &ValueRange,
    right: &ValueRange,
) -> (Vec<String>, Vec<Vec<String>>) {
    let header = |block: &ValueRange| -> Vec<String> {
        block
            .values
            .iter()
            .map(|column| column.first().cloned().unwrap_or_default())
            .collect()
    };
    let height = |block: &ValueRange| -> usize {
        block
            .values
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    };
    let cells = |block: &ValueRange, index: usize| -> Vec<String> {
        block
            .values
            .iter()
            .map(|column| column.get(index).cloned().unwrap_or_default())
            .collect()
    };

    let headers = header(left).into_iter().chain(header(right)).collect();
    let rows = (1..height(left).max(height(right)))
        .map(|index| {
            cells(left, index)
                .into_iter()
                .chain(cells(right, index))
                .collect()
        })
        .collect();

    (headers, rows)
}

/// Column positions inside a merged group row.
struct GroupLayout {
    /// Group number.
    number:    usize,
    /// Member e-mails.
    emails:    usize,
    /// Grade.
    grade:     usize,
    /// Corrector.
    corrector: usize,
    /// Feedback.
    feedback:  usize,
    /// Notified marker.
    notified:  usize,
}

impl GroupLayout {
    /// Locates every group column, failing on the first one missing.
    ///
    /// The first `split` headers belong to the group-emails block, which
    /// holds the group number and e-mails; the rest belong to the assignment
    /// block. Each column is only looked up in its own block.
    fn locate(
        headers: &[String],
        split: usize,
        columns: &GroupColumns,
        emails_range: &str,
        assignment_range: &str,
    ) -> Result<Self, StoreError> {
        let (emails, assignment) = headers.split_at(split.min(headers.len()));
        let in_assignment = |column: &str| {
            header_index(assignment, column, assignment_range).map(|index| index + split)
        };

        Ok(Self {
            number:    header_index(emails, &columns.number, emails_range)?,
            emails:    header_index(emails, &columns.emails, emails_range)?,
            grade:     in_assignment(&columns.grade)?,
            corrector: in_assignment(&columns.corrector)?,
            feedback:  in_assignment(&columns.feedback)?,
            notified:  in_assignment(&columns.notified)?,
        })
    }

    /// Whether the row still has to be notified.
    fn is_pending(&self, row: &[String]) -> bool {
        !is_placeholder(&row[self.emails]) && is_placeholder(&row[self.notified])
    }
}

/// Splits a comma-separated e-mail cell into trimmed, non-empty addresses.
fn split_emails(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads groups pending notification and records notifications.
pub struct GroupNotificationStore {
    /// Spreadsheet access.
    sheets:       Arc<dyn SheetsApi>,
    /// Named range with group numbers and e-mails.
    emails_range: String,
    /// Prefix of assignment range names.
    prefix:       String,
    /// Header names.
    columns:      GroupColumns,
}

impl GroupNotificationStore {
    /// Creates a store using the ranges and headers in `config`.
    pub fn new(sheets: Arc<dyn SheetsApi>, config: &Config) -> Self {
        Self {
            sheets,
            emails_range: config.group_emails_range.clone(),
            prefix: config.assignment_prefix.clone(),
            columns: config.group_columns.clone(),
        }
    }

    /// Named-range key for `assignment`.
    pub fn range_key(&self, assignment: &str) -> Result<String, StoreError> {
        assignment_range_key(&self.prefix, assignment)
            .ok_or_else(|| StoreError::RangeNotFound(self.prefix.clone()))
    }

    /// Groups of `assignment` that have e-mails and have not been notified.
    pub fn pending_groups(&self, assignment: &str) -> Result<Vec<Group>, StoreError> {
        let key = self.range_key(assignment)?;

        let mut blocks = self
            .sheets
            .batch_values(&[self.emails_range.as_str(), key.as_str()], Dimension::Columns)
            .map_err(|err| match StoreError::from(err) {
                StoreError::RangeNotFound(range) if range == self.emails_range => {
                    StoreError::RangeNotFound(range)
                }
                StoreError::RangeNotFound(_) => StoreError::RangeNotFound(key.clone()),
                other => other,
            })?
            .into_iter();
        let (Some(emails_block), Some(assignment_block)) = (blocks.next(), blocks.next()) else {
            return Err(StoreError::RangeNotFound(key));
        };

        let (headers, rows) = merge_column_blocks(&emails_block, &assignment_block);
        let split = emails_block.values.len();
        let layout =
            GroupLayout::locate(&headers, split, &self.columns, &self.emails_range, &key)?;

        // The marker is written back, so it lives in the assignment block.
        let anchor = RangeStart::parse(&assignment_block.range)?;
        let notified_offset = layout.notified - split;

        let groups = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| layout.is_pending(row))
            .map(|(index, row)| {
                Group::builder()
                    .number(row[layout.number].trim())
                    .emails(split_emails(&row[layout.emails]))
                    .corrector(row[layout.corrector].clone())
                    .grade(row[layout.grade].clone())
                    .feedback(row[layout.feedback].clone())
                    .notified(row[layout.notified].clone())
                    .notified_cell(anchor.offset(notified_offset, index + 1))
                    .build()
            })
            .collect_vec();

        tracing::info!(
            "{} of {} groups pending for `{assignment}` ({key})",
            groups.len(),
            rows.len()
        );
        Ok(groups)
    }

    /// Writes the notified marker into `group`'s notified cell.
    pub fn mark_notified(&self, group: &Group) -> Result<(), StoreError> {
        let cell = group.notified_cell.to_a1();
        tracing::info!("Marking group {} as notified at {cell}", group.number);
        self.sheets.update_value(&cell, NOTIFIED_MARKER)?;
        Ok(())
    }
}
