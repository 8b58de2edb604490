#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use subtle::ConstantTimeEq;

use crate::config::Config;

/// Body of the 401 response.
pub const LOGIN_FAILED: &str = "No se pudo verificar el login!";

/// `user:password` pair from a `Basic` authorization header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Whether `headers` carry the configured admin credentials. Always false
/// when no admin is configured.
pub fn is_admin(headers: &HeaderMap, config: &Config) -> bool {
    match (config.admin_credentials(), basic_credentials(headers)) {
        (Some((user, password)), Some((given_user, given_password))) => {
            let user_matches = user.as_bytes().ct_eq(given_user.as_bytes());
            let password_matches = password.as_bytes().ct_eq(given_password.as_bytes());
            (user_matches & password_matches).into()
        }
        _ => false,
    }
}

/// 401 asking the client for Basic credentials.
pub fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"Login required\""),
        )],
        LOGIN_FAILED,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn decodes_basic_header() {
        let headers = with_auth(&format!("Basic {}", STANDARD.encode("admin:pa:ss")));
        assert_eq!(
            basic_credentials(&headers),
            Some(("admin".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn no_configured_admin_rejects_everyone() {
        let config = Config::builder()
            .spreadsheet_key("key")
            .oauth_client_id("client")
            .oauth_client_secret("secret")
            .oauth_refresh_token("refresh")
            .secret("s3cret")
            .course("Algoritmos")
            .account("curso@example.com")
            .build();
        let headers = with_auth(&format!("Basic {}", STANDARD.encode(":")));

        assert!(!is_admin(&headers, &config));
    }

    #[test]
    fn only_the_exact_pair_is_admin() {
        let config = Config::builder()
            .spreadsheet_key("key")
            .oauth_client_id("client")
            .oauth_client_secret("secret")
            .oauth_refresh_token("refresh")
            .secret("s3cret")
            .course("Algoritmos")
            .account("curso@example.com")
            .admin_user("admin")
            .admin_password("hunter2")
            .build();
        let basic = |pair: &str| with_auth(&format!("Basic {}", STANDARD.encode(pair)));

        assert!(is_admin(&basic("admin:hunter2"), &config));
        assert!(!is_admin(&basic("admin:hunter"), &config));
        assert!(!is_admin(&basic("admin:hunter22"), &config));
        assert!(!is_admin(&basic("Admin:hunter2"), &config));
        assert!(!is_admin(&basic(":"), &config));
    }

    #[test]
    fn other_schemes_are_ignored() {
        assert_eq!(basic_credentials(&with_auth("Bearer abc")), None);
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
        assert_eq!(basic_credentials(&with_auth("Basic %%%")), None);
    }
}
