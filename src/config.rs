//! Defines structures and builders related to authentication configuration.
//!
//! Provides a structured way to handle credentials, the optional
//! restrictions put on the login, and the `AntiForgeryChecker` used to sign the
//! `state` parameter.
//!
//! ## Structures
//! - `GoogleAuthConfig`: Stores all the necessary authentication information.
//! - `GoogleAuthConfigBuilder`: A builder for constructing a `GoogleAuthConfig` instance.
//!
//! # Example
//! ```rust,no_run
//! use google_auth_state::{
//!     anti_forgery::AntiForgeryChecker,
//!     config::GoogleAuthConfig,
//!     secret::{Secret, SecretSnapshot, StaticSecrets},
//! };
//!
//! let checker = AntiForgeryChecker::new(StaticSecrets::new(SecretSnapshot::single(
//!     Secret::from("change-me"),
//! )));
//! let config = GoogleAuthConfig::builder(checker)
//!     .client_id("your-client-id")
//!     .client_secret("your-client-secret")
//!     .redirect_url("https://your-app.com/oauth2callback")
//!     .domain("example.com")
//!     .build();
//! ```
use std::time::Duration;

use crate::{anti_forgery::AntiForgeryChecker, session::DEFAULT_SESSION_ID_KEY};

/// Google's OpenID Connect discovery document.
pub const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ClientID(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ClientSecret(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RedirectURI(pub String);

/// Holds all necessary authentication information required for Google's OpenID Connect flow.
///
/// It is immutable once constructed and is meant to be built once at startup
/// and shared across requests.
///
/// # Fields
/// - `client_id`, `client_secret`: Credentials obtained from Google Cloud Console.
/// - `redirect_url`: The redirect URI registered in Google Cloud Console.
/// - `domain`: If set, only accounts whose email is in this domain may log in.
/// - `max_auth_age`: Sent to Google as `max_auth_age`, forcing re-authentication after that long.
/// - `enforce_valid_user`: Whether a stored identity past its expiry is rejected.
/// - `prompt`: Sent to Google as `prompt` (e.g. `select_account`).
#[derive(Debug, Clone)]
pub struct GoogleAuthConfig {
    pub(crate) client_id: ClientID,
    pub(crate) client_secret: ClientSecret,
    pub(crate) redirect_url: RedirectURI,
    pub(crate) domain: Option<String>,
    pub(crate) max_auth_age: Option<Duration>,
    pub(crate) enforce_valid_user: bool,
    pub(crate) prompt: Option<String>,
    pub(crate) session_id_key: String,
    pub(crate) discovery_url: String,
    pub(crate) anti_forgery: AntiForgeryChecker,
}

// ==========impl GoogleAuthConfig==========
impl GoogleAuthConfig {
    /// Returns a new `GoogleAuthConfigBuilder`.
    /// The anti-forgery checker has no sensible default, so it is required up front.
    pub fn builder(anti_forgery: AntiForgeryChecker) -> GoogleAuthConfigBuilder {
        GoogleAuthConfigBuilder::new(anti_forgery)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id.0
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url.0
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn max_auth_age(&self) -> Option<Duration> {
        self.max_auth_age
    }

    pub fn enforce_valid_user(&self) -> bool {
        self.enforce_valid_user
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Session store key holding the session id.
    pub fn session_id_key(&self) -> &str {
        &self.session_id_key
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    pub fn anti_forgery(&self) -> &AntiForgeryChecker {
        &self.anti_forgery
    }
}

/// Provides a convenient way to create a `GoogleAuthConfig` instance step by step.
#[derive(Debug, Clone)]
pub struct GoogleAuthConfigBuilder {
    client_id: ClientID,
    client_secret: ClientSecret,
    redirect_url: RedirectURI,
    domain: Option<String>,
    max_auth_age: Option<Duration>,
    enforce_valid_user: bool,
    prompt: Option<String>,
    session_id_key: String,
    discovery_url: String,
    anti_forgery: AntiForgeryChecker,
}

// ==========impl GoogleAuthConfigBuilder==========
impl GoogleAuthConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new(anti_forgery: AntiForgeryChecker) -> Self {
        Self {
            client_id: ClientID::default(),
            client_secret: ClientSecret::default(),
            redirect_url: RedirectURI::default(),
            domain: None,
            max_auth_age: None,
            enforce_valid_user: true,
            prompt: None,
            session_id_key: DEFAULT_SESSION_ID_KEY.to_string(),
            discovery_url: GOOGLE_DISCOVERY_URL.to_string(),
            anti_forgery,
        }
    }

    /// Constructs a `GoogleAuthConfig` instance with the provided values.
    pub fn build(self) -> GoogleAuthConfig {
        GoogleAuthConfig {
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_url: self.redirect_url,
            domain: self.domain,
            max_auth_age: self.max_auth_age,
            enforce_valid_user: self.enforce_valid_user,
            prompt: self.prompt,
            session_id_key: self.session_id_key,
            discovery_url: self.discovery_url,
            anti_forgery: self.anti_forgery,
        }
    }

    /// Sets the client ID obtained from Google Cloud Console.
    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = ClientID(client_id.to_string());
        self
    }

    /// Sets the client secret associated with the client ID.
    pub fn client_secret(mut self, client_secret: &str) -> Self {
        self.client_secret = ClientSecret(client_secret.to_string());
        self
    }

    /// Sets the redirect URI registered in Google Cloud Console.
    pub fn redirect_url(mut self, redirect_url: &str) -> Self {
        self.redirect_url = RedirectURI(redirect_url.to_string());
        self
    }

    /// Restricts logins to accounts in this domain (e.g. a Google Workspace domain).
    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn max_auth_age(mut self, max_auth_age: Duration) -> Self {
        self.max_auth_age = Some(max_auth_age);
        self
    }

    pub fn enforce_valid_user(mut self, enforce_valid_user: bool) -> Self {
        self.enforce_valid_user = enforce_valid_user;
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.prompt = Some(prompt.to_string());
        self
    }

    pub fn session_id_key(mut self, session_id_key: &str) -> Self {
        self.session_id_key = session_id_key.to_string();
        self
    }

    /// Overrides the discovery document location. Mostly useful for tests.
    pub fn discovery_url(mut self, discovery_url: &str) -> Self {
        self.discovery_url = discovery_url.to_string();
        self
    }
}
