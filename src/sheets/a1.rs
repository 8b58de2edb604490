use std::fmt;

use super::SheetsError;

/// Converts a zero-based column index into its letters (`0` → `A`, `26` →
/// `AA`).
pub fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Converts column letters into a zero-based index; `None` for anything that
/// is not made of ASCII letters only.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, c| {
        c.is_ascii_alphabetic()
            .then(|| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
    })
    .map(|n| n - 1)
}

/// A single cell addressed by absolute sheet coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    /// Sheet name as it appears in A1 notation (quoted when needed).
    pub sheet:  String,
    /// Zero-based column index.
    pub column: usize,
    /// One-based row number.
    pub row:    usize,
}

impl CellRef {
    /// Renders the cell as `Sheet!B7`.
    pub fn to_a1(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sheet.is_empty() {
            write!(f, "{}{}", column_letters(self.column), self.row)
        } else {
            write!(f, "{}!{}{}", self.sheet, column_letters(self.column), self.row)
        }
    }
}

/// Top-left anchor of a range as returned by the Sheets API, e.g.
/// `'Notas APP'!F1:I40`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeStart {
    /// Sheet part, verbatim (quotes kept so it can be reused in requests).
    pub sheet:  String,
    /// Zero-based index of the first column.
    pub column: usize,
    /// One-based number of the first row.
    pub row:    usize,
}

impl RangeStart {
    /// Parses the anchor of an A1 range.
    ///
    /// Whole-column ranges (`F:I`) start at row 1; a range without a sheet
    /// part yields an empty sheet name.
    pub fn parse(range: &str) -> Result<Self, SheetsError> {
        let malformed = || SheetsError::MalformedRange(range.to_string());

        let (sheet, cells) = split_sheet(range);
        let first = cells.split(':').next().unwrap_or_default().trim();

        let letters_end = first
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(first.len());
        let (letters, digits) = first.split_at(letters_end);

        let column = column_index(letters).ok_or_else(malformed)?;
        let row = if digits.is_empty() {
            1
        } else {
            digits.parse::<usize>().map_err(|_| malformed())?
        };
        if row == 0 {
            return Err(malformed());
        }

        Ok(Self {
            sheet: sheet.to_string(),
            column,
            row,
        })
    }

    /// The cell `columns` to the right and `rows` below the anchor.
    pub fn offset(&self, columns: usize, rows: usize) -> CellRef {
        CellRef {
            sheet:  self.sheet.clone(),
            column: self.column + columns,
            row:    self.row + rows,
        }
    }
}

/// Splits `Sheet!A1:B2` at the `!` that ends the sheet name, honouring quoted
/// names that may themselves contain `!`.
fn split_sheet(range: &str) -> (&str, &str) {
    if range.starts_with('\'') {
        // Quotes inside a quoted name are doubled, so the closing quote is the
        // last one before the separator.
        if let Some(bang) = range.rfind("'!") {
            return (&range[..=bang], &range[bang + 2..]);
        }
    }
    match range.rfind('!') {
        Some(bang) => (&range[..bang], &range[bang + 1..]),
        None => ("", range),
    }
}

/// Quotes a sheet title for use in a range if it is not a plain identifier.
pub fn quote_sheet(title: &str) -> String {
    if !title.is_empty() && title.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        title.to_string()
    } else {
        format!("'{}'", title.replace('\'', "''"))
    }
}
