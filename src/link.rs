#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// HMAC over SHA-256.
type HmacSha256 = Hmac<Sha256>;

/// Errors raised while validating a consultation key.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinkError {
    /// The key does not have the `payload.signature` shape or does not decode.
    #[error("Malformed key")]
    Malformed,
    /// The signature does not match the payload.
    #[error("Bad signature")]
    BadSignature,
}

/// Signs student ids into URL-safe keys and reads them back.
///
/// A key is `base64url(json(id)) "." base64url(hmac_sha256(secret, payload))`.
#[derive(Clone)]
pub struct LinkSigner {
    /// Signing secret.
    secret: Vec<u8>,
}

impl LinkSigner {
    /// Creates a signer keyed with `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// MAC keyed with the signer's secret.
    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length")
    }

    /// Produces the key for `student_id`.
    pub fn sign(&self, student_id: &str) -> String {
        let json = serde_json::Value::String(student_id.to_string()).to_string();
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{payload}.{signature}")
    }

    /// Checks the signature of `key` and returns the student id inside it.
    pub fn verify(&self, key: &str) -> Result<String, LinkError> {
        let (payload, signature) = key.rsplit_once('.').ok_or(LinkError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| LinkError::Malformed)?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| LinkError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| LinkError::Malformed)?;
        serde_json::from_slice::<String>(&json).map_err(|_| LinkError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_key_yields_the_same_id() {
        let signer = LinkSigner::new("s3cret");
        let key = signer.sign("942039");
        assert_eq!(signer.verify(&key).as_deref(), Ok("942039"));
    }

    #[test]
    fn key_is_url_safe() {
        let key = LinkSigner::new("s3cret").sign("pa dr/ón?");
        assert!(
            key.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        );
    }

    #[test]
    fn other_secret_is_rejected() {
        let key = LinkSigner::new("s3cret").sign("942039");
        assert_eq!(LinkSigner::new("other").verify(&key), Err(LinkError::BadSignature));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signer = LinkSigner::new("s3cret");
        let key = signer.sign("942039");
        let (_, signature) = key.split_once('.').unwrap();
        let forged = format!("{}.{signature}", URL_SAFE_NO_PAD.encode("\"100000\""));
        assert_eq!(signer.verify(&forged), Err(LinkError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let signer = LinkSigner::new("s3cret");
        assert_eq!(signer.verify("no-dot-here"), Err(LinkError::Malformed));
        assert_eq!(signer.verify("abc.%%%"), Err(LinkError::Malformed));
    }
}
