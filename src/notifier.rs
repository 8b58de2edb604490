//! Renders e-mail templates and delivers them over SMTP.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use handlebars::Handlebars;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::{Credentials, Mechanism},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::Config,
    credentials::{AccessToken, AuthError, CredentialProvider},
};

/// Template of the e-mail carrying a consultation link.
pub const SIGNIN_TEMPLATE: &str = "signin";

/// Subject of the e-mail carrying a consultation link.
pub const SIGNIN_SUBJECT: &str = "Enlace para consultar las notas";

/// Template of the per-group assignment feedback e-mail.
pub const ASSIGNMENT_TEMPLATE: &str = "assignment_feedback";

/// Errors raised while sending an e-mail.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The template is missing or failed to render.
    #[error("Could not render e-mail template `{template}`: {message}")]
    Template {
        /// Template name.
        template: String,
        /// Renderer diagnostic.
        message:  String,
    },
    /// A sender or recipient address could not be parsed.
    #[error("Invalid e-mail address `{0}`")]
    Address(String),
    /// The message could not be assembled.
    #[error("Could not build e-mail: {0}")]
    Build(String),
    /// No mail token could be obtained.
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    /// The transport refused or dropped the message.
    #[error("No se pudo enviar el mail: {0}")]
    SendFailure(String),
}

/// Something that can deliver a finished message as `account`, authenticating
/// with an OAuth2 access token.
pub trait MailTransport: Send + Sync {
    /// Delivers `message`, returning the transport's diagnostic on failure.
    fn deliver(&self, account: &str, token: &AccessToken, message: &Message)
    -> Result<(), String>;
}

/// STARTTLS SMTP relay authenticated with XOAUTH2. Every delivery opens and
/// closes its own connection.
pub struct SmtpXoauth2 {
    /// Relay host.
    host: String,
    /// Submission port.
    port: u16,
}

impl SmtpXoauth2 {
    /// Relay from `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
        }
    }
}

impl MailTransport for SmtpXoauth2 {
    fn deliver(
        &self,
        account: &str,
        token: &AccessToken,
        message: &Message,
    ) -> Result<(), String> {
        let transport = SmtpTransport::starttls_relay(&self.host)
            .map_err(|e| e.to_string())?
            .port(self.port)
            .credentials(Credentials::new(account.to_string(), token.secret().to_string()))
            .authentication(vec![Mechanism::Xoauth2])
            .build();

        transport
            .send(message)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Sends templated plain-text e-mails from the course account.
pub struct Notifier {
    /// Templates, registered by the caller.
    templates:   Arc<Handlebars<'static>>,
    /// Source of mail-scope tokens.
    credentials: Arc<CredentialProvider>,
    /// Delivery mechanism.
    transport:   Arc<dyn MailTransport>,
    /// `"<course> <account>"`.
    from:        Mailbox,
    /// SMTP login.
    account:     String,
}

impl Notifier {
    /// Creates a notifier sending as the course account in `config`.
    pub fn new(
        templates: Arc<Handlebars<'static>>,
        credentials: Arc<CredentialProvider>,
        transport: Arc<dyn MailTransport>,
        config: &Config,
    ) -> Result<Self, NotifyError> {
        let address = config
            .account
            .parse()
            .map_err(|_| NotifyError::Address(config.account.clone()))?;

        Ok(Self {
            templates,
            credentials,
            transport,
            from: Mailbox::new(Some(config.course.clone()), address),
            account: config.account.clone(),
        })
    }

    /// Renders `template` with `variables` and sends it to every address in
    /// `to` as one message.
    pub fn send<T: Serialize>(
        &self,
        template: &str,
        subject: &str,
        to: &[String],
        variables: &T,
    ) -> Result<(), NotifyError> {
        let body = self
            .templates
            .render(template, variables)
            .map_err(|e| NotifyError::Template {
                template: template.to_string(),
                message:  e.to_string(),
            })?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .date_now();
        for address in to {
            let mailbox: Mailbox = address
                .parse()
                .map_err(|_| NotifyError::Address(address.clone()))?;
            builder = builder.to(mailbox);
        }
        let message = builder
            .body(body)
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let token = self.credentials.mail_credential()?;
        self.transport
            .deliver(&self.account, &token, &message)
            .map_err(NotifyError::SendFailure)?;

        tracing::info!("Sent `{template}` to {}", to.join(", "));
        Ok(())
    }
}
