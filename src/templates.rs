#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use handlebars::{Handlebars, TemplateError};

use crate::notifier::{ASSIGNMENT_TEMPLATE, SIGNIN_TEMPLATE};

/// HTML pages, compiled into the binary.
const PAGES: [(&str, &str); 6] = [
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
    ("index", include_str!("../templates/index.hbs")),
    ("email_sent", include_str!("../templates/email_sent.hbs")),
    ("error", include_str!("../templates/error.hbs")),
    ("result", include_str!("../templates/result.hbs")),
];

/// Plain-text e-mail bodies, compiled into the binary.
const MAILS: [(&str, &str); 2] = [
    (SIGNIN_TEMPLATE, include_str!("../templates/mail/signin.hbs")),
    (ASSIGNMENT_TEMPLATE, include_str!("../templates/mail/assignment_feedback.hbs")),
];

/// Registry for the web pages; values are HTML-escaped.
pub fn pages() -> Result<Handlebars<'static>, TemplateError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    for (name, source) in PAGES {
        registry.register_template_string(name, source)?;
    }
    Ok(registry)
}

/// Registry for e-mail bodies; values are inserted verbatim.
pub fn mails() -> Result<Handlebars<'static>, TemplateError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.set_strict_mode(true);
    for (name, source) in MAILS {
        registry.register_template_string(name, source)?;
    }
    Ok(registry)
}
