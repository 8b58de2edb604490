#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

use anyhow::{Context, Result};
use typed_builder::TypedBuilder;

use crate::credentials::ServiceAccountKey;

/// Default Google OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default Google Sheets v4 REST endpoint.
pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Header names used to read group rows out of the group-emails block and the
/// per-assignment block.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct GroupColumns {
    /// Group number column, in the group-emails block.
    #[builder(default = "Grupo".to_string())]
    pub number:    String,
    /// Comma-separated member e-mails, in the group-emails block.
    #[builder(default = "Emails".to_string())]
    pub emails:    String,
    /// Grade column, in the assignment block.
    #[builder(default = "Nota".to_string())]
    pub grade:     String,
    /// Corrector column, in the assignment block.
    #[builder(default = "Corrector".to_string())]
    pub corrector: String,
    /// Feedback column, in the assignment block.
    #[builder(default = "Correcciones".to_string())]
    pub feedback:  String,
    /// Notified marker column, in the assignment block.
    #[builder(default = "Notificado".to_string())]
    pub notified:  String,
}

impl Default for GroupColumns {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything the application needs at startup.
///
/// Built once (usually with [`Config::from_env`]) and handed to the
/// constructors that need it; nothing reads the environment after that.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Config {
    /// Key of the spreadsheet holding roster, grades and groups.
    pub spreadsheet_key:        String,
    /// Worksheet with the student roster.
    #[builder(default = "Listado".to_string())]
    pub roster_sheet:           String,
    /// Worksheet with one grade row per student.
    #[builder(default = "Notas APP".to_string())]
    pub grades_sheet:           String,
    /// Roster header holding student ids; also the id header of the grade
    /// sheet.
    #[builder(default = "Padrón".to_string())]
    pub id_column:              String,
    /// Roster header holding e-mail addresses.
    #[builder(default = "E-Mail".to_string())]
    pub email_column:           String,
    /// Named range with group numbers and member e-mails.
    #[builder(default = "emailsGrupos".to_string())]
    pub group_emails_range:     String,
    /// Prefix prepended to the PascalCase assignment name to find its range.
    #[builder(default = "notas".to_string())]
    pub assignment_prefix:      String,
    /// Header names for group rows.
    #[builder(default)]
    pub group_columns:          GroupColumns,
    /// OAuth2 client id.
    pub oauth_client_id:        String,
    /// OAuth2 client secret.
    pub oauth_client_secret:    String,
    /// Long-lived OAuth2 refresh token for the course account.
    pub oauth_refresh_token:    String,
    /// Service account used for the spreadsheet instead of the refresh
    /// token, when configured.
    #[builder(default, setter(strip_option))]
    pub service_account:        Option<ServiceAccountKey>,
    /// OAuth2 token endpoint.
    #[builder(default = DEFAULT_TOKEN_URI.to_string())]
    pub token_uri:              String,
    /// Sheets REST endpoint, without a trailing slash.
    #[builder(default = DEFAULT_SHEETS_ENDPOINT.to_string())]
    pub sheets_endpoint:        String,
    /// Secret used to sign consultation links.
    pub secret:                 String,
    /// Course name, used as the sender name and inside messages.
    pub course:                 String,
    /// Course e-mail account; SMTP user and `From` address.
    pub account:                String,
    /// SMTP relay host.
    #[builder(default = "smtp.gmail.com".to_string())]
    pub smtp_host:              String,
    /// SMTP submission port (STARTTLS).
    #[builder(default = 587)]
    pub smtp_port:              u16,
    /// Public base URL consultation links are built on.
    #[builder(default = "http://localhost:5000".to_string())]
    pub base_url:               String,
    /// Basic-auth user allowed to trigger notification batches.
    #[builder(default, setter(strip_option))]
    pub admin_user:             Option<String>,
    /// Basic-auth password for [`Config::admin_user`].
    #[builder(default, setter(strip_option))]
    pub admin_password:         Option<String>,
    /// Timeout applied to spreadsheet and token HTTP calls.
    #[builder(default = Duration::from_secs(30))]
    pub http_timeout:           Duration,
}

impl Config {
    /// Reads the configuration from `NOTAS_*` environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self> {
        let group_columns = GroupColumns {
            number:    env_or("NOTAS_COL_GROUP", "Grupo"),
            emails:    env_or("NOTAS_COL_GROUP_EMAILS", "Emails"),
            grade:     env_or("NOTAS_COL_GRADE", "Nota"),
            corrector: env_or("NOTAS_COL_CORRECTOR", "Corrector"),
            feedback:  env_or("NOTAS_COL_FEEDBACK", "Correcciones"),
            notified:  env_or("NOTAS_COL_NOTIFIED", "Notificado"),
        };

        let smtp_port = match optional("NOTAS_SMTP_PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("NOTAS_SMTP_PORT is not a port number: {port}"))?,
            None => 587,
        };

        let service_account = match optional("NOTAS_SERVICE_ACCOUNT_JSON") {
            Some(value) => Some(
                ServiceAccountKey::from_json(&service_account_json(&value)?)
                    .context("NOTAS_SERVICE_ACCOUNT_JSON is not a service account key")?,
            ),
            None => None,
        };

        Ok(Self {
            spreadsheet_key: required("NOTAS_SPREADSHEET_KEY")?,
            roster_sheet: env_or("NOTAS_ROSTER_SHEET", "Listado"),
            grades_sheet: env_or("NOTAS_GRADES_SHEET", "Notas APP"),
            id_column: env_or("NOTAS_COL_ID", "Padrón"),
            email_column: env_or("NOTAS_COL_EMAIL", "E-Mail"),
            group_emails_range: env_or("NOTAS_GROUP_EMAILS_RANGE", "emailsGrupos"),
            assignment_prefix: env_or("NOTAS_ASSIGNMENT_PREFIX", "notas"),
            group_columns,
            oauth_client_id: required("NOTAS_OAUTH_CLIENT")?,
            oauth_client_secret: required("NOTAS_OAUTH_SECRET")?,
            oauth_refresh_token: required("NOTAS_REFRESH_TOKEN")?,
            service_account,
            token_uri: env_or("NOTAS_TOKEN_URI", DEFAULT_TOKEN_URI),
            sheets_endpoint: env_or("NOTAS_SHEETS_ENDPOINT", DEFAULT_SHEETS_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            secret: required("NOTAS_SECRET")?,
            course: required("NOTAS_COURSE_NAME")?,
            account: required("NOTAS_ACCOUNT")?,
            smtp_host: env_or("NOTAS_SMTP_HOST", "smtp.gmail.com"),
            smtp_port,
            base_url: env_or("NOTAS_BASE_URL", "http://localhost:5000")
                .trim_end_matches('/')
                .to_string(),
            admin_user: optional("NOTAS_ADMIN_USER"),
            admin_password: optional("NOTAS_ADMIN_PASSWORD"),
            http_timeout: read_timeout_secs("NOTAS_HTTP_TIMEOUT_SECS", 30),
        })
    }

    /// Title shown on every page.
    pub fn app_title(&self) -> String {
        format!("{} - Consulta de Notas", self.course)
    }

    /// Returns the admin credentials when both halves are configured.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (self.admin_user.as_deref(), self.admin_password.as_deref()) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

/// Reads a required, non-blank environment variable.
fn required(name: &str) -> Result<String> {
    optional(name).with_context(|| format!("{name} must be set"))
}

/// Reads an environment variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Reads an environment variable or falls back to `default`.
fn env_or(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

/// The service account key itself, or the contents of the file it names.
fn service_account_json(value: &str) -> Result<String> {
    if value.starts_with('{') {
        return Ok(value.to_string());
    }
    std::fs::read_to_string(value)
        .with_context(|| format!("Could not read service account key file {value}"))
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
