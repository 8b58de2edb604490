#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use lettre::Address;
use serde::Deserialize;

/// Shown when the padrón has characters other than letters, digits or `_`.
pub const INVALID_ID: &str = "Ingrese un padrón válido";

/// Shown when the e-mail address does not parse.
pub const INVALID_EMAIL: &str = "Ingrese una dirección de e-mail válida";

/// Body of `POST /`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkRequest {
    /// Student id as typed.
    #[serde(default)]
    pub padron: String,
    /// E-mail as typed.
    #[serde(default)]
    pub email:  String,
}

/// Trims and lower-cases a form value.
fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl LinkRequest {
    /// The request with both fields normalised.
    pub fn normalized(&self) -> Self {
        Self {
            padron: normalize(&self.padron),
            email:  normalize(&self.email),
        }
    }

    /// Normalises and validates both fields, returning `(padron, email)` or
    /// the message to show next to the form.
    pub fn validate(&self) -> Result<(String, String), &'static str> {
        let Self { padron, email } = self.normalized();

        if padron.is_empty() || !padron.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(INVALID_ID);
        }
        if email.parse::<Address>().is_err() {
            return Err(INVALID_EMAIL);
        }
        Ok((padron, email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(padron: &str, email: &str) -> LinkRequest {
        LinkRequest {
            padron: padron.into(),
            email:  email.into(),
        }
    }

    #[test]
    fn fields_are_trimmed_and_lowercased() {
        let valid = request("  942039 ", " Foo@Bar.COM").validate();
        assert_eq!(valid, Ok(("942039".into(), "foo@bar.com".into())));
    }

    #[test]
    fn padron_must_be_word_characters() {
        assert_eq!(request("", "foo@bar.com").validate(), Err(INVALID_ID));
        assert_eq!(request("94-20", "foo@bar.com").validate(), Err(INVALID_ID));
        assert!(request("ab_12", "foo@bar.com").validate().is_ok());
    }

    #[test]
    fn email_must_parse() {
        assert_eq!(request("942039", "not-an-address").validate(), Err(INVALID_EMAIL));
        assert_eq!(request("942039", "").validate(), Err(INVALID_EMAIL));
    }
}
