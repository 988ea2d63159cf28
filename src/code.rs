//! This module handles the process of requesting and verifying an authorization code
//! in the OpenID Connect authentication flow.
//!
//! It provides the following key functionalities:
//! - Generating an authorization request URL (`AuthorizationRequest`).
//! - Parsing the callback from Google and verifying its anti-forgery token (`CallbackParams`).
//!
//! # Key Structures and Features
//!
//! ## `AuthorizationRequest`
//! A structure used to generate the authorization request URL.
//! - Always asks for `openid email profile` with `response_type=code`.
//! - Carries the anti-forgery token as `state`.
//! - Adds `hd`, `max_auth_age`, `prompt` and `login_hint` when they are set.
//!
//! ## `CallbackParams`
//! The query parameters Google sends back to the redirect URL.
//! - The `code` must not be used before the `state` has been verified.
//!
//! ## `Code`
//! Represents a verified authorization code that can be exchanged for tokens.
//! - This is obtained only through `CallbackParams::verified_code`.
//!
//! # Flow
//! 1. Generate an `AntiForgeryToken` for the browser's session id and include it in the request.
//! 2. Redirect the user to Google's authentication page.
//! 3. After authentication, Google redirects back with `code` and `state` (`CallbackParams`).
//! 4. Verify `state` against the session id with `CallbackParams::verified_code`.
//! 5. If verification succeeds, a `Code` is obtained, which can be exchanged for tokens.
use std::collections::HashMap;

use tracing::error;
use url::Url;

use crate::{
    anti_forgery::{AntiForgeryChecker, AntiForgeryToken},
    config::{ClientID, GoogleAuthConfig, RedirectURI},
    error::Error,
};

const SCOPE: &str = "openid email profile";

/// Represents the value of the `code` query parameter sent by Google during the OpenID Connect flow.
/// This structure ensures that the `code` can only be obtained after validating the `state`.
#[derive(Debug, Clone, PartialEq)]
pub struct Code(pub(crate) String);

impl Code {
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Generates a URL to initiate the authorization request.
/// # Example
/// ```rust,ignore
/// let token = config.anti_forgery().generate(session_id.value(), now)?;
/// let url = AuthorizationRequest::new(&config, "https://accounts.google.com/o/oauth2/v2/auth", &token)
///     .login_hint(Some("user@example.com"))
///     .into_url()?;
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    auth_endpoint: String,
    client_id: ClientID,
    response_type: String,
    redirect_uri: RedirectURI,
    state: AntiForgeryToken,
    hd: Option<String>,
    max_auth_age: Option<u64>,
    prompt: Option<String>,
    login_hint: Option<String>,
}

impl AuthorizationRequest {
    /// # **Parameters**
    ///
    /// - `config` (`&GoogleAuthConfig`):
    ///   - Supplies `client_id`, `redirect_url` and the optional `domain`, `max_auth_age` and `prompt`.
    ///
    /// - `auth_endpoint` (`&str`):
    ///   - The `authorization_endpoint` from the discovery document.
    ///
    /// - `state` (`&AntiForgeryToken`):
    ///   - The signed token binding this request to the browser session.
    pub fn new(config: &GoogleAuthConfig, auth_endpoint: &str, state: &AntiForgeryToken) -> Self {
        Self {
            auth_endpoint: auth_endpoint.to_string(),
            client_id: config.client_id.to_owned(),
            response_type: "code".to_string(),
            redirect_uri: config.redirect_url.to_owned(),
            state: state.to_owned(),
            hd: config.domain.to_owned(),
            max_auth_age: config.max_auth_age.map(|age| age.as_secs()),
            prompt: config.prompt.to_owned(),
            login_hint: None,
        }
    }

    /// Pre-fills the account chooser, typically with the email of an identity
    /// the user already has.
    pub fn login_hint(mut self, login_hint: Option<&str>) -> Self {
        self.login_hint = login_hint.map(str::to_string);
        self
    }

    /// Constructs a URL with the required parameters for Google authentication.
    pub fn into_url(&self) -> Result<String, Error> {
        let mut url = Url::parse(&self.auth_endpoint).map_err(|e| {
            error!("Failed to parse authorization endpoint: {}", e);
            Error::URL
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id.0)
                .append_pair("response_type", &self.response_type)
                .append_pair("scope", SCOPE)
                .append_pair("redirect_uri", &self.redirect_uri.0)
                .append_pair("state", self.state.value());
            if let Some(hd) = &self.hd {
                query.append_pair("hd", hd);
            }
            if let Some(max_auth_age) = self.max_auth_age {
                query.append_pair("max_auth_age", &max_auth_age.to_string());
            }
            if let Some(prompt) = &self.prompt {
                query.append_pair("prompt", prompt);
            }
            if let Some(login_hint) = &self.login_hint {
                query.append_pair("login_hint", login_hint);
            }
        }
        Ok(url.into())
    }
}

/// The query parameters of Google's redirect back to the application.
///
/// Nothing here is trusted until `state` has been verified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    /// Parses the full callback URL.
    pub fn from_url(callback_url: &str) -> Result<Self, Error> {
        let url = Url::parse(callback_url).map_err(|e| {
            error!("Failed to parse url from google: {}", e);
            Error::URL
        })?;
        Ok(Self::from_pairs(url.query_pairs()))
    }

    /// Parses the query string of the callback, without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    fn from_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    ) -> Self {
        let mut params: HashMap<_, _> = pairs.collect();
        Self {
            state: params.remove("state").map(|v| v.into_owned()),
            code: params.remove("code").map(|v| v.into_owned()),
            error: params.remove("error").map(|v| v.into_owned()),
        }
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// The `error` Google reports when the user did not grant access.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Verifies `state` for `session_id` and hands out the code.
    ///
    /// The anti-forgery check comes first; only then is a provider `error` or a
    /// missing `code` reported.
    pub fn verified_code(
        &self,
        checker: &AntiForgeryChecker,
        session_id: &str,
        now: u64,
    ) -> Result<Code, Error> {
        let state = self.state.as_deref().ok_or(Error::NoStateParameter)?;
        checker.verify(state, session_id, now)?;
        if let Some(e) = &self.error {
            return Err(Error::ProviderError(e.to_string()));
        }
        let code = self.code.as_deref().ok_or(Error::NoCodeParameter)?;
        Ok(Code(code.to_string()))
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use url::Url;

    use super::{AuthorizationRequest, CallbackParams, Code};
    use crate::{
        anti_forgery::AntiForgeryChecker,
        config::{GoogleAuthConfig, GoogleAuthConfigBuilder},
        error::Error,
        secret::{Secret, SecretSnapshot, StaticSecrets},
    };

    const NOW: u64 = 1_742_189_616;
    const AUTH_ENDPOINT: &str = "https://auth.example.com/auth";

    fn checker() -> AntiForgeryChecker {
        AntiForgeryChecker::new(StaticSecrets::new(SecretSnapshot::single(Secret::from(
            "secret",
        ))))
    }

    fn builder() -> GoogleAuthConfigBuilder {
        GoogleAuthConfig::builder(checker())
            .client_id("my_client_id")
            .client_secret("my_secret")
            .redirect_url("https://redirect.example.com/callback")
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_auth_req_into_url() {
        let config = builder().build();
        let state = config.anti_forgery().generate("sid", NOW).unwrap();

        let url = AuthorizationRequest::new(&config, AUTH_ENDPOINT, &state)
            .into_url()
            .unwrap();
        assert!(url.starts_with(AUTH_ENDPOINT));

        let params = query(&url);
        assert_eq!(params.len(), 5);
        assert_eq!(params["client_id"], "my_client_id");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["redirect_uri"], "https://redirect.example.com/callback");
        assert_eq!(params["state"], state.value());
    }

    #[test]
    fn test_auth_req_into_url_optional_params() {
        let config = builder()
            .domain("example.com")
            .max_auth_age(Duration::from_secs(3600))
            .prompt("select_account")
            .build();
        let state = config.anti_forgery().generate("sid", NOW).unwrap();

        let url = AuthorizationRequest::new(&config, AUTH_ENDPOINT, &state)
            .login_hint(Some("user@example.com"))
            .into_url()
            .unwrap();

        let params = query(&url);
        assert_eq!(params["hd"], "example.com");
        assert_eq!(params["max_auth_age"], "3600");
        assert_eq!(params["prompt"], "select_account");
        assert_eq!(params["login_hint"], "user@example.com");
    }

    #[test]
    fn test_auth_req_invalid_endpoint() {
        let config = builder().build();
        let state = config.anti_forgery().generate("sid", NOW).unwrap();
        let res = AuthorizationRequest::new(&config, "not a url", &state).into_url();
        assert_eq!(res, Err(Error::URL));
    }

    #[test]
    fn test_callback_params_from_url() {
        let params =
            CallbackParams::from_url("https://example.com/callback?state=abc&code=4%2F0Ab&scope=email")
                .unwrap();
        assert_eq!(params.state(), Some("abc"));
        assert_eq!(params.code.as_deref(), Some("4/0Ab"));
        assert_eq!(params.error(), None);

        assert_eq!(CallbackParams::from_url("/callback?state=abc"), Err(Error::URL));
    }

    #[test]
    fn test_callback_params_from_query() {
        let params = CallbackParams::from_query("error=access_denied&state=abc");
        assert_eq!(params.error(), Some("access_denied"));
        assert_eq!(params.state(), Some("abc"));
        assert!(params.code.is_none());
    }

    #[test]
    fn test_verified_code() {
        let checker = checker();
        let state = checker.generate("sid", NOW).unwrap();
        let params = CallbackParams::from_query(&format!("state={}&code=the_code", state.value()));

        assert_eq!(
            params.verified_code(&checker, "sid", NOW + 5),
            Ok(Code("the_code".to_string()))
        );
        assert_eq!(
            params.verified_code(&checker, "other", NOW + 5),
            Err(Error::SessionMismatch)
        );
    }

    #[test]
    fn test_verified_code_order_of_checks() {
        let checker = checker();
        let state = checker.generate("sid", NOW).unwrap();

        let no_state = CallbackParams::from_query("code=the_code");
        assert_eq!(
            no_state.verified_code(&checker, "sid", NOW),
            Err(Error::NoStateParameter)
        );

        // a provider error is only reported once the state is known to be ours
        let denied = CallbackParams::from_query("error=access_denied&state=forged");
        assert_eq!(
            denied.verified_code(&checker, "sid", NOW),
            Err(Error::MalformedToken)
        );
        let denied =
            CallbackParams::from_query(&format!("error=access_denied&state={}", state.value()));
        assert_eq!(
            denied.verified_code(&checker, "sid", NOW),
            Err(Error::ProviderError("access_denied".to_string()))
        );

        let no_code = CallbackParams::from_query(&format!("state={}", state.value()));
        assert_eq!(
            no_code.verified_code(&checker, "sid", NOW),
            Err(Error::NoCodeParameter)
        );
    }
}
