#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Margin before expiry at which the mail token is refreshed.
pub const MAIL_EXPIRY_MARGIN: TimeDelta = TimeDelta::minutes(5);

/// Clock skew tolerated on the spreadsheet token.
pub const SPREADSHEET_EXPIRY_MARGIN: TimeDelta = TimeDelta::seconds(10);

/// OAuth2 scope requested by the service account.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Grant type of the signed service-account assertion.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for a service-account assertion. Google caps it at one
/// hour.
const ASSERTION_LIFETIME: TimeDelta = TimeDelta::hours(1);

/// Errors raised while obtaining an access token.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The authority rejected the refresh request.
    #[error("Could not refresh credentials: {0}")]
    Unauthorized(String),
    /// The authority could not be reached.
    #[error("Could not reach the token endpoint")]
    Http(#[from] reqwest::Error),
    /// The service account key could not be read or used for signing.
    #[error("Invalid service account key: {0}")]
    InvalidKey(String),
}

/// A bearer token ready to be sent to Google.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// An access token source that knows when it has gone stale.
pub trait Credential: Send {
    /// Whether the current token can still be used.
    fn is_valid(&self) -> bool;

    /// Obtains a new token from the issuing authority.
    fn refresh(&mut self) -> Result<(), AuthError>;

    /// The current token, if one was ever obtained.
    fn access_token(&self) -> Option<AccessToken>;
}

/// Token endpoint response for the refresh-token grant.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    /// New bearer token.
    access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in:   Option<i64>,
}

/// Token endpoint error body.
#[derive(Deserialize, Debug)]
struct TokenErrorResponse {
    /// OAuth2 error code, e.g. `invalid_grant`.
    error:             String,
    /// Human readable description, when present.
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth2 refresh-token credential with a configurable expiry margin.
pub struct OAuthCredential {
    /// Shared blocking HTTP client.
    http:          reqwest::blocking::Client,
    /// Token endpoint.
    token_uri:     String,
    /// OAuth2 client id.
    client_id:     String,
    /// OAuth2 client secret.
    client_secret: String,
    /// Refresh token exchanged for access tokens.
    refresh_token: String,
    /// How long before expiry the token stops counting as valid.
    margin:        TimeDelta,
    /// Current token.
    token:         Option<AccessToken>,
    /// When the current token expires.
    expires_at:    Option<DateTime<Utc>>,
}

impl OAuthCredential {
    /// Creates a credential that has not fetched a token yet.
    pub fn new(
        http: reqwest::blocking::Client,
        config: &Config,
        margin: TimeDelta,
    ) -> Self {
        Self {
            http,
            token_uri: config.token_uri.clone(),
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            refresh_token: config.oauth_refresh_token.clone(),
            margin,
            token: None,
            expires_at: None,
        }
    }

    /// Seeds the credential with an already issued token.
    pub fn with_token(mut self, token: AccessToken, expires_at: DateTime<Utc>) -> Self {
        self.token = Some(token);
        self.expires_at = Some(expires_at);
        self
    }

    /// Validity check against an explicit instant.
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expires_at)) => expires_at - self.margin > now,
            _ => false,
        }
    }
}

impl Credential for OAuthCredential {
    fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    fn refresh(&mut self) -> Result<(), AuthError> {
        tracing::debug!("Refreshing access token at {}", self.token_uri);
        let (token, expires_at) = exchange(
            &self.http,
            &self.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ],
        )?;

        self.token = Some(token);
        self.expires_at = Some(expires_at);
        Ok(())
    }

    fn access_token(&self) -> Option<AccessToken> {
        self.token.clone()
    }
}

/// Posts a grant to `token_uri` and returns the issued token with its
/// expiry. Tokens without a lifetime expire immediately and are refreshed on
/// next use.
fn exchange(
    http: &reqwest::blocking::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
    let requested_at = Utc::now();
    let response = http.post(token_uri).form(form).send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {description}", err.error),
                None => err.error,
            },
            Err(_) => format!("{status}: {body}"),
        };
        return Err(AuthError::Unauthorized(message));
    }

    let TokenResponse {
        access_token,
        expires_in,
    } = response.json()?;

    Ok((
        AccessToken::new(access_token),
        requested_at + TimeDelta::seconds(expires_in.unwrap_or(0)),
    ))
}

/// The fields of a Google service account JSON key that are needed to sign
/// token requests.
#[derive(Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceAccountKey {
    /// Account e-mail, the assertion issuer.
    pub client_email:   String,
    /// PEM encoded RSA private key.
    pub private_key:    String,
    /// Id of `private_key`, sent as the JWT `kid`.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Token endpoint the key was issued for.
    #[serde(default)]
    pub token_uri:      Option<String>,
}

impl ServiceAccountKey {
    /// Parses the JSON key file Google hands out for a service account.
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json).map_err(|e| AuthError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"..")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Claims of the signed assertion exchanged for a spreadsheet token.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct AssertionClaims {
    /// Service account e-mail.
    pub iss:   String,
    /// Space separated scopes.
    pub scope: String,
    /// Token endpoint.
    pub aud:   String,
    /// Issued at, seconds since the epoch.
    pub iat:   i64,
    /// Expiry, seconds since the epoch.
    pub exp:   i64,
}

/// Service account credential using the JWT-bearer grant.
pub struct ServiceAccountCredential {
    /// Shared blocking HTTP client.
    http:        reqwest::blocking::Client,
    /// Token endpoint, also the assertion audience.
    token_uri:   String,
    /// Service account e-mail.
    issuer:      String,
    /// Id of the signing key, if known.
    key_id:      Option<String>,
    /// RSA signing key.
    signing_key: EncodingKey,
    /// How long before expiry the token stops counting as valid.
    margin:      TimeDelta,
    /// Current token.
    token:       Option<AccessToken>,
    /// When the current token expires.
    expires_at:  Option<DateTime<Utc>>,
}

impl ServiceAccountCredential {
    /// Creates a credential from a parsed key. The key's own token endpoint
    /// wins over `default_token_uri`.
    pub fn new(
        http: reqwest::blocking::Client,
        key: &ServiceAccountKey,
        default_token_uri: &str,
        margin: TimeDelta,
    ) -> Result<Self, AuthError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        Ok(Self {
            http,
            token_uri: key
                .token_uri
                .clone()
                .unwrap_or_else(|| default_token_uri.to_string()),
            issuer: key.client_email.clone(),
            key_id: key.private_key_id.clone(),
            signing_key,
            margin,
            token: None,
            expires_at: None,
        })
    }

    /// Signed assertion issued at `now`.
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss:   self.issuer.clone(),
            scope: SPREADSHEETS_SCOPE.to_string(),
            aud:   self.token_uri.clone(),
            iat:   now.timestamp(),
            exp:   (now + ASSERTION_LIFETIME).timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))
    }
}

impl Credential for ServiceAccountCredential {
    fn is_valid(&self) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expires_at)) => expires_at - self.margin > Utc::now(),
            _ => false,
        }
    }

    fn refresh(&mut self) -> Result<(), AuthError> {
        tracing::debug!("Requesting service account token for {}", self.issuer);
        let assertion = self.assertion(Utc::now())?;
        let (token, expires_at) = exchange(
            &self.http,
            &self.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
        )?;

        self.token = Some(token);
        self.expires_at = Some(expires_at);
        Ok(())
    }

    fn access_token(&self) -> Option<AccessToken> {
        self.token.clone()
    }
}

/// Hands out fresh tokens for the spreadsheet and mail scopes.
pub struct CredentialProvider {
    /// Credential used for the Sheets API.
    spreadsheet: Mutex<Box<dyn Credential>>,
    /// Credential used for SMTP XOAUTH2.
    mail:        Mutex<Box<dyn Credential>>,
}

impl CredentialProvider {
    /// Builds a provider from one credential per scope.
    pub fn new(spreadsheet: Box<dyn Credential>, mail: Box<dyn Credential>) -> Self {
        Self {
            spreadsheet: Mutex::new(spreadsheet),
            mail:        Mutex::new(mail),
        }
    }

    /// Builds the production provider. The spreadsheet scope uses the
    /// configured service account, or the course account's refresh token
    /// when there is none; mail always uses the refresh token.
    pub fn from_config(
        http: reqwest::blocking::Client,
        config: &Config,
    ) -> Result<Self, AuthError> {
        let spreadsheet: Box<dyn Credential> = match &config.service_account {
            Some(key) => Box::new(ServiceAccountCredential::new(
                http.clone(),
                key,
                &config.token_uri,
                SPREADSHEET_EXPIRY_MARGIN,
            )?),
            None => Box::new(OAuthCredential::new(
                http.clone(),
                config,
                SPREADSHEET_EXPIRY_MARGIN,
            )),
        };

        Ok(Self::new(
            spreadsheet,
            Box::new(OAuthCredential::new(http, config, MAIL_EXPIRY_MARGIN)),
        ))
    }

    /// Token for the Sheets API, refreshed if needed.
    pub fn spreadsheet_credential(&self) -> Result<AccessToken, AuthError> {
        fresh(&self.spreadsheet, "spreadsheet")
    }

    /// Token for the mail account, refreshed if it expires within five
    /// minutes.
    pub fn mail_credential(&self) -> Result<AccessToken, AuthError> {
        fresh(&self.mail, "mail")
    }
}

/// Refreshes `slot` when it is no longer valid and returns its token.
fn fresh(slot: &Mutex<Box<dyn Credential>>, scope: &str) -> Result<AccessToken, AuthError> {
    let mut credential = slot
        .lock()
        .map_err(|_| AuthError::Unauthorized(format!("{scope} credential lock poisoned")))?;

    if !credential.is_valid() {
        tracing::info!("Refreshing {scope} credential");
        credential.refresh()?;
    }

    credential
        .access_token()
        .ok_or_else(|| AuthError::Unauthorized(format!("no {scope} token after refresh")))
}
