//! Access to the spreadsheet that acts as the system of record.
//!
//! [`SheetsApi`] is the narrow contract the stores are written against:
//! read a range by rows or by columns, read several ranges at once, and write
//! one cell. [`GoogleSheets`] implements it over the Sheets v4 REST API.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// A1 notation helpers.
pub mod a1;

use std::{collections::HashMap, sync::Arc};

use reqwest::{StatusCode, Url, blocking::Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::Config,
    credentials::{AuthError, CredentialProvider},
};

/// Errors raised by spreadsheet calls.
#[derive(Error, Debug)]
pub enum SheetsError {
    /// The requested range (usually a named range) does not exist.
    #[error("Range `{0}` does not exist in the spreadsheet")]
    RangeNotFound(String),
    /// The API answered with an error.
    #[error("Spreadsheet API error ({status}): {message}")]
    Api {
        /// HTTP status returned.
        status:  u16,
        /// Message from the error body.
        message: String,
    },
    /// The request never got an answer.
    #[error("Could not reach the spreadsheet API")]
    Http(#[from] reqwest::Error),
    /// No token could be obtained for the spreadsheet scope.
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    /// A range returned by the API could not be parsed.
    #[error("Malformed range in response: `{0}`")]
    MalformedRange(String),
    /// The configured endpoint is not a URL.
    #[error("Invalid spreadsheet endpoint: `{0}`")]
    InvalidEndpoint(String),
}

/// Whether values come back grouped by row or by column.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    /// `values[i]` is row `i`.
    #[default]
    Rows,
    /// `values[i]` is column `i`.
    Columns,
}

impl Dimension {
    /// Query-string value for `majorDimension`.
    fn as_param(self) -> &'static str {
        match self {
            Dimension::Rows => "ROWS",
            Dimension::Columns => "COLUMNS",
        }
    }
}

/// A block of formatted cell values.
///
/// Trailing empty cells are omitted by the API, so inner vectors may be
/// shorter than their neighbours.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// Resolved A1 range, e.g. `'Notas APP'!F1:I40`.
    pub range:           String,
    /// Grouping of `values`.
    #[serde(default)]
    pub major_dimension: Dimension,
    /// Cell values.
    #[serde(default)]
    pub values:          Vec<Vec<String>>,
}

impl ValueRange {
    /// Builds a range from literal values; handy for fixtures.
    pub fn new<R, V, S>(range: impl Into<String>, major_dimension: Dimension, values: R) -> Self
    where
        R: IntoIterator<Item = V>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            range: range.into(),
            major_dimension,
            values: values
                .into_iter()
                .map(|inner| inner.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Interprets a row-major block whose first row is the header as a list
    /// of records; missing trailing cells read as empty strings.
    pub fn records(&self) -> Vec<HashMap<String, String>> {
        let mut rows = self.values.iter();
        let Some(headers) = rows.next() else {
            return Vec::new();
        };

        rows.map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
    }
}

/// The spreadsheet operations the stores rely on.
pub trait SheetsApi: Send + Sync {
    /// Reads one range.
    fn values(&self, range: &str, dimension: Dimension) -> Result<ValueRange, SheetsError>;

    /// Reads several ranges in one call, in request order.
    fn batch_values(
        &self,
        ranges: &[&str],
        dimension: Dimension,
    ) -> Result<Vec<ValueRange>, SheetsError>;

    /// Writes a single cell, parsed as if typed by a user.
    fn update_value(&self, cell: &str, value: &str) -> Result<(), SheetsError>;
}

/// Response of `values:batchGet`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    /// One block per requested range.
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

/// Error envelope used by Google APIs.
#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    /// The error itself.
    error: ApiErrorDetail,
}

/// Details of an API error.
#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    /// Human readable message.
    #[serde(default)]
    message: String,
}

/// Sheets v4 client for one spreadsheet.
pub struct GoogleSheets {
    /// Shared blocking HTTP client.
    http:        Client,
    /// Source of spreadsheet-scope tokens.
    credentials: Arc<CredentialProvider>,
    /// `{endpoint}/{spreadsheet_key}`.
    base:        Url,
}

impl GoogleSheets {
    /// Creates a client for the spreadsheet named in `config`.
    pub fn new(
        http: Client,
        credentials: Arc<CredentialProvider>,
        config: &Config,
    ) -> Result<Self, SheetsError> {
        let base = Url::parse(&format!(
            "{}/{}",
            config.sheets_endpoint.trim_end_matches('/'),
            config.spreadsheet_key
        ))
        .map_err(|_| SheetsError::InvalidEndpoint(config.sheets_endpoint.clone()))?;

        Ok(Self {
            http,
            credentials,
            base,
        })
    }

    /// Appends path segments to the spreadsheet URL, percent-encoding each.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends an authorised request and decodes a JSON body, mapping API
    /// errors; `range_hint` names the range when the API message does not.
    fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::blocking::RequestBuilder,
        range_hint: &str,
    ) -> Result<T, SheetsError> {
        let token = self.credentials.spreadsheet_credential()?;
        let response = request.bearer_auth(token.secret()).send()?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json()?);
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|err| err.error.message)
            .unwrap_or(body);

        if status == StatusCode::BAD_REQUEST {
            if let Some(range) = unparsable_range(&message) {
                let range = if range.is_empty() { range_hint } else { range };
                return Err(SheetsError::RangeNotFound(range.to_string()));
            }
        }

        Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Range named in an "Unable to parse range: X" API message. Empty when the
/// message names none.
fn unparsable_range(message: &str) -> Option<&str> {
    message
        .split_once("Unable to parse range")
        .map(|(_, rest)| rest.trim_start_matches(':').trim())
}

impl SheetsApi for GoogleSheets {
    fn values(&self, range: &str, dimension: Dimension) -> Result<ValueRange, SheetsError> {
        tracing::debug!("Reading range {range}");
        let request = self.http.get(self.url(&["values", range])).query(&[
            ("majorDimension", dimension.as_param()),
            ("valueRenderOption", "FORMATTED_VALUE"),
        ]);
        self.send(request, range)
    }

    fn batch_values(
        &self,
        ranges: &[&str],
        dimension: Dimension,
    ) -> Result<Vec<ValueRange>, SheetsError> {
        tracing::debug!("Reading ranges {}", ranges.join(", "));
        let mut query = vec![
            ("majorDimension", dimension.as_param()),
            ("valueRenderOption", "FORMATTED_VALUE"),
        ];
        query.extend(ranges.iter().map(|range| ("ranges", *range)));

        let request = self
            .http
            .get(self.url(&["values:batchGet"]))
            .query(&query);
        let response: BatchGetResponse = self.send(request, &ranges.join(", "))?;
        Ok(response.value_ranges)
    }

    fn update_value(&self, cell: &str, value: &str) -> Result<(), SheetsError> {
        tracing::debug!("Writing {value:?} to {cell}");
        let body = ValueRange::new(cell, Dimension::Rows, [[value]]);
        let request = self
            .http
            .put(self.url(&["values", cell]))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body);
        let _: serde_json::Value = self.send(request, cell)?;
        Ok(())
    }
}
