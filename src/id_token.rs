//! Provides the process of exchanging the code and decoding the IDToken.
//!
//! This module:
//! TokenExchangeRequest: A data structure for sending requests to the token endpoint.
//! TokenExchangeResponse: A data structure for parsing the response from the token endpoint.
//! IDToken: A data structure representing the decoded payload of an ID token.
//! AccessToken: A structure representing an access token used to call Google APIs.
//! IDTokenRow: A structure representing an encoded ID token before decoding.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    code::Code,
    config::{ClientID, ClientSecret, GoogleAuthConfig, RedirectURI},
    error::Error,
};

/// Represents an OAuth 2.0 access token.
/// This token is used to access Google APIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken(pub(crate) String);

impl AccessToken {
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Represents a decoded ID token payload in OpenID Connect.
///
/// Only the claims this crate relies on are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IDToken {
    pub sub: String,   // User ID (Unique identifier for Google accounts)
    pub email: String, // User's email address
    pub exp: u64,      // Expiration timestamp (UNIX time)
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub email_verified: Option<bool>,
    pub hd: Option<String>, // Hosted domain of a Google Workspace account
    pub iat: Option<u64>,
}

impl IDToken {
    /// Decodes an IDTokenRow (encoded ID token) into an IDToken.
    ///
    /// The signature is not checked: the token was received directly from
    /// Google's token endpoint over TLS.
    pub fn decode_from_row(id_token: &IDTokenRow) -> Result<Self, Error> {
        let split: Vec<_> = id_token.0.split('.').collect();
        if split.len() != 3 {
            return Err(Error::Decode);
        }
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(split[1]).map_err(|e| {
            error!("Failed to decode IDToken: {}", e);
            Error::Decode
        })?;

        let id_token = serde_json::from_slice::<IDToken>(&bytes).map_err(|e| {
            error!("Failed to deserialize IDToken: {}", e);
            Error::Deserialize
        })?;
        Ok(id_token)
    }

    /// The part of the email after the `@`.
    pub fn email_domain(&self) -> Option<&str> {
        self.email.rsplit_once('@').map(|(_, domain)| domain)
    }
}

/// A structure used to send a code exchange request to Google's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchangeRequest {
    token_endpoint: String,
    code: Code,
    client_id: ClientID,
    client_secret: ClientSecret,
    redirect_uri: RedirectURI,
    grant_type: String,
}

impl TokenExchangeRequest {
    /// Creates a new request using parameters from the config and the
    /// discovered token endpoint.
    pub fn new(config: &GoogleAuthConfig, token_endpoint: &str, code: Code) -> Self {
        Self {
            token_endpoint: token_endpoint.to_string(),
            code,
            client_id: config.client_id.to_owned(),
            client_secret: config.client_secret.to_owned(),
            redirect_uri: config.redirect_url.to_owned(),
            grant_type: "authorization_code".to_string(),
        }
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    pub fn code(&self) -> &str {
        &self.code.0
    }

    pub fn client_id(&self) -> &str {
        &self.client_id.0
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret.0
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri.0
    }

    pub fn grant_type(&self) -> &str {
        &self.grant_type
    }
}

/// Represents the response from Google's token endpoint, which includes both an access token and an ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    access_token: AccessToken,
    id_token: IDTokenRow,
    expires_in: Option<u64>,
    scope: Option<String>,
    token_type: Option<String>,
}

impl TokenExchangeResponse {
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn id_token(&self) -> &IDTokenRow {
        &self.id_token
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }
}

/// Represents an encoded ID token, which must be decoded before use.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IDTokenRow(pub(crate) String);

// ==========Tests==========
#[cfg(test)]
mod tests {
    use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};

    use crate::{
        anti_forgery::AntiForgeryChecker,
        code::Code,
        config::GoogleAuthConfig,
        error::Error,
        id_token::{IDToken, IDTokenRow, TokenExchangeRequest, TokenExchangeResponse},
        secret::{Secret, SecretSnapshot, StaticSecrets},
    };

    fn row(payload: &str) -> IDTokenRow {
        IDTokenRow(format!(
            "header.{}.signature",
            BASE64_URL_SAFE_NO_PAD.encode(payload)
        ))
    }

    #[test]
    fn test_id_token_decode_success() {
        let id_token_json = r#"{
            "iss": "https://accounts.google.com",
            "aud": "my_aud",
            "sub": "my_sub",
            "azp": "my_azp",
            "email": "user@example.com",
            "email_verified": true,
            "hd": "example.com",
            "at_hash": "my_at_hash",
            "iat": 1742189616,
            "exp": 1742193216
        }"#;
        let decoded = IDToken::decode_from_row(&row(id_token_json)).unwrap();
        assert_eq!(decoded.sub, "my_sub");
        assert_eq!(decoded.email, "user@example.com");
        assert_eq!(decoded.exp, 1742193216);
        assert_eq!(decoded.email_domain(), Some("example.com"));
    }

    #[test]
    fn test_id_token_decode_invalid_base64() {
        let id_token_row = IDTokenRow("invalid_base64".to_string());
        assert_eq!(IDToken::decode_from_row(&id_token_row), Err(Error::Decode));

        let id_token_row = IDTokenRow("a.!!!.c".to_string());
        assert_eq!(IDToken::decode_from_row(&id_token_row), Err(Error::Decode));
    }

    #[test]
    fn test_id_token_decode_invalid_json() {
        let decoded = IDToken::decode_from_row(&row("not a valid json"));
        assert_eq!(decoded, Err(Error::Deserialize));

        // `email` is required
        let decoded = IDToken::decode_from_row(&row(r#"{"sub":"1","exp":1}"#));
        assert_eq!(decoded, Err(Error::Deserialize));
    }

    #[test]
    fn test_email_domain() {
        let token = IDToken::decode_from_row(&row(
            r#"{"sub":"1","email":"first.last@sub.example.com","exp":1}"#,
        ))
        .unwrap();
        assert_eq!(token.email_domain(), Some("sub.example.com"));
    }

    #[test]
    fn test_token_exchange_request_new() {
        let checker = AntiForgeryChecker::new(StaticSecrets::new(SecretSnapshot::single(
            Secret::from("secret"),
        )));
        let config = GoogleAuthConfig::builder(checker)
            .client_id("client_id")
            .client_secret("secret")
            .redirect_url("https://redirect.example.com")
            .build();

        let code = Code("auth_code".to_string());
        let request =
            TokenExchangeRequest::new(&config, "https://token.example.com", code.clone());

        assert_eq!(request.token_endpoint(), "https://token.example.com");
        assert_eq!(request.client_id(), "client_id");
        assert_eq!(request.client_secret(), "secret");
        assert_eq!(request.redirect_uri(), "https://redirect.example.com");
        assert_eq!(request.grant_type(), "authorization_code");
        assert_eq!(request.code, code);
    }

    #[test]
    fn test_token_exchange_response_minimal() {
        let response: TokenExchangeResponse = serde_json::from_str(
            r#"{"access_token":"access_token_value","id_token":"id_token_value"}"#,
        )
        .unwrap();

        assert_eq!(response.access_token().value(), "access_token_value");
        assert_eq!(response.id_token(), &IDTokenRow("id_token_value".to_string()));
        assert_eq!(response.expires_in(), None);
        assert_eq!(response.scope(), None);
        assert_eq!(response.token_type(), None);
    }
}
