#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use anyhow::{Context, Result};
use handlebars::Handlebars;

use crate::{
    config::Config,
    credentials::CredentialProvider,
    link::LinkSigner,
    notifier::{MailTransport, Notifier, SmtpXoauth2},
    sheets::{GoogleSheets, SheetsApi},
    store::{GradeStore, GroupNotificationStore, RosterStore},
    templates,
};

/// Every long-lived component, wired together once at startup.
pub struct App {
    /// Startup configuration.
    pub config:   Config,
    /// Roster verification.
    pub roster:   RosterStore,
    /// Grade lookup.
    pub grades:   GradeStore,
    /// Group notifications.
    pub groups:   GroupNotificationStore,
    /// Outgoing mail.
    pub notifier: Notifier,
    /// Consultation key signer.
    pub signer:   LinkSigner,
    /// HTML pages.
    pub pages:    Handlebars<'static>,
}

impl App {
    /// Wires the components around the given spreadsheet, credentials and
    /// mail transport.
    pub fn new(
        config: Config,
        sheets: Arc<dyn SheetsApi>,
        credentials: Arc<CredentialProvider>,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self> {
        let mails = Arc::new(templates::mails().context("Could not load e-mail templates")?);
        let notifier = Notifier::new(mails, credentials, transport, &config)
            .context("Could not configure the mail sender")?;

        Ok(Self {
            roster: RosterStore::new(Arc::clone(&sheets), &config),
            grades: GradeStore::new(Arc::clone(&sheets), &config),
            groups: GroupNotificationStore::new(sheets, &config),
            notifier,
            signer: LinkSigner::new(&config.secret),
            pages: templates::pages().context("Could not load page templates")?,
            config,
        })
    }

    /// Production wiring: Google Sheets, service account or refresh-token
    /// credentials and SMTP with XOAUTH2.
    ///
    /// Builds a blocking HTTP client, so call it outside of an async context.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to construct shared HTTP client")?;

        let credentials = Arc::new(
            CredentialProvider::from_config(http.clone(), &config)
                .context("Could not load the spreadsheet credentials")?,
        );
        let sheets = GoogleSheets::new(http, Arc::clone(&credentials), &config)
            .context("Could not configure the spreadsheet client")?;
        let transport = SmtpXoauth2::new(&config);

        Self::new(config, Arc::new(sheets), credentials, Arc::new(transport))
    }

    /// Consultation URL for `student_id`.
    pub fn consult_link(&self, student_id: &str) -> String {
        format!(
            "{}/consultar?clave={}",
            self.config.base_url.trim_end_matches('/'),
            self.signer.sign(student_id)
        )
    }
}
