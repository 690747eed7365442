//! Client authentication at the token and revocation endpoints
//!
//! Accepts `client_secret_basic` (HTTP Basic, RFC 6749 Section 2.3.1) and
//! `client_secret_post` (form fields). A request may use only one of them.

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{GrantError, Result};
use crate::params::Params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

pub fn client_credentials(headers: &HeaderMap, params: &Params) -> Result<ClientCredentials> {
    let form_id = params.optional("client_id")?;
    let form_secret = params.optional("client_secret")?;

    if let Some(basic) = basic_credentials(headers)? {
        if form_secret.is_some() {
            return Err(GrantError::InvalidRequest(
                "use either HTTP Basic or client_secret, not both".to_string(),
            ));
        }
        if form_id.as_deref().is_some_and(|id| id != basic.client_id) {
            return Err(GrantError::InvalidRequest(
                "client_id does not match the Authorization header".to_string(),
            ));
        }
        return Ok(basic);
    }

    let client_id =
        form_id.ok_or_else(|| GrantError::InvalidRequest("client_id is required".to_string()))?;
    let client_secret = form_secret.ok_or(GrantError::InvalidClient)?;
    Ok(ClientCredentials {
        client_id,
        client_secret,
    })
}

/// Credentials from `Authorization: Basic`, or `None` if another scheme (or none) is used
fn basic_credentials(headers: &HeaderMap) -> Result<Option<ClientCredentials>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| GrantError::InvalidClient)?;

    let Some((scheme, encoded)) = value.split_once(' ') else {
        return Ok(None);
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(None);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(GrantError::InvalidClient)?;
    let (id, secret) = decoded.split_once(':').ok_or(GrantError::InvalidClient)?;

    Ok(Some(ClientCredentials {
        client_id: form_decode(id)?,
        client_secret: form_decode(secret)?,
    }))
}

/// Basic credentials are form-urlencoded before base64 (RFC 6749 Section 2.3.1)
fn form_decode(value: &str) -> Result<String> {
    urlencoding::decode(&value.replace('+', " "))
        .map(|v| v.into_owned())
        .map_err(|_| GrantError::InvalidClient)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn basic(id: &str, secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("{id}:{secret}"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_form_credentials() {
        let params = Params::parse("client_id=abc&client_secret=s3cret");
        let creds = client_credentials(&HeaderMap::new(), &params).unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret, "s3cret");
    }

    #[test]
    fn test_basic_credentials() {
        let params = Params::parse("grant_type=authorization_code");
        let creds = client_credentials(&basic("abc", "s3cret"), &params).unwrap();
        assert_eq!(
            creds,
            ClientCredentials {
                client_id: "abc".to_string(),
                client_secret: "s3cret".to_string()
            }
        );
    }

    #[test]
    fn test_basic_credentials_are_form_decoded() {
        let creds = client_credentials(&basic("a%3Ab", "p+w%25"), &Params::default()).unwrap();
        assert_eq!(creds.client_id, "a:b");
        assert_eq!(creds.client_secret, "p w%");
    }

    #[test]
    fn test_basic_with_matching_form_id() {
        let params = Params::parse("client_id=abc");
        assert!(client_credentials(&basic("abc", "s3cret"), &params).is_ok());
    }

    #[test]
    fn test_both_methods_rejected() {
        let params = Params::parse("client_id=abc&client_secret=s3cret");
        assert!(matches!(
            client_credentials(&basic("abc", "s3cret"), &params),
            Err(GrantError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_mismatched_client_id_rejected() {
        let params = Params::parse("client_id=other");
        assert!(matches!(
            client_credentials(&basic("abc", "s3cret"), &params),
            Err(GrantError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_missing_secret_is_invalid_client() {
        let params = Params::parse("client_id=abc");
        assert_eq!(
            client_credentials(&HeaderMap::new(), &params),
            Err(GrantError::InvalidClient)
        );
    }

    #[test]
    fn test_malformed_basic_is_invalid_client() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert_eq!(
            client_credentials(&headers, &Params::default()),
            Err(GrantError::InvalidClient)
        );
    }
}
