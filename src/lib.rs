//! # notas
//!
//! Grade consultation and feedback notifications for a course whose grades
//! live in a Google spreadsheet.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Wiring of every long-lived component
pub mod app;
/// Assignment notification batches
pub mod batch;
/// Startup configuration read from the environment
pub mod config;
/// OAuth2 access tokens for the spreadsheet and mail scopes
pub mod credentials;
/// Signed consultation links
pub mod link;
/// Templated e-mail delivery
pub mod notifier;
/// Google Sheets v4 values API
pub mod sheets;
/// Roster, grades and group sheets
pub mod store;
/// Page and e-mail templates
pub mod templates;
/// HTTP front end
pub mod web;

pub use app::App;
pub use config::Config;
