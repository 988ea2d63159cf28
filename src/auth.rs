//! Ties the login flow together.
//!
//! `GoogleAuth` owns the configuration, the HTTP client and the discovery
//! document cache. It is meant to be created once and shared (e.g. in an
//! `Arc`) by every request handler.
//!
//! - `redirect_to_google` builds the URL to send the browser to.
//! - `validate_callback` turns Google's redirect back into a `UserIdentity`,
//!   failing at the first check that does not hold:
//!   1. the session has a session id,
//!   2. the callback carries a `state`,
//!   3. the `state` is a valid anti-forgery token for that session id,
//!   4. the `code` is exchanged at the token endpoint,
//!   5. the ID token's email is in the configured domain, if any,
//!   6. the user info endpoint returns the profile.
use std::time::Duration;

use jsonwebtoken::get_current_timestamp;
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::{
    code::{AuthorizationRequest, CallbackParams},
    config::GoogleAuthConfig,
    discovery::{Discovery, DiscoveryDocument},
    error::Error,
    executer::{DiscoveryExe, Executer, TokenExchangeExe, UserInfoExe},
    id_token::{IDToken, TokenExchangeRequest},
    identity::{UserIdentity, UserInfoRequest},
    session::{SessionUpdate, SessionValues, ensure_session_id},
};

/// Timeout of the client built by `GoogleAuth::new`.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to send the browser, and what to persist in its session first.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRedirect {
    pub url: String,
    /// Set when a new session id was minted for this browser.
    pub session_update: Option<SessionUpdate>,
}

/// Google login for one application.
#[derive(Debug)]
pub struct GoogleAuth {
    config: GoogleAuthConfig,
    client: Client,
    discovery: Discovery,
}

impl GoogleAuth {
    /// Uses a client with `DEFAULT_HTTP_TIMEOUT`.
    pub fn new(config: GoogleAuthConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                error!("Failed to build http client: {:?}", e);
                Error::Network(e.to_string())
            })?;
        Ok(Self::with_client(config, client))
    }

    /// Uses `client` for every call to Google, with whatever timeouts it has.
    pub fn with_client(config: GoogleAuthConfig, client: Client) -> Self {
        let discovery = Discovery::new(&config.discovery_url);
        Self {
            config,
            client,
            discovery,
        }
    }

    pub fn config(&self) -> &GoogleAuthConfig {
        &self.config
    }

    async fn discovery_document(&self) -> Result<&DiscoveryDocument, Error> {
        let exe = DiscoveryExe::new(self.client.clone());
        self.discovery.document(&exe).await
    }

    /// Builds the redirect to Google's authorization endpoint.
    pub async fn redirect_to_google<S>(&self, session: &S) -> Result<LoginRedirect, Error>
    where
        S: SessionValues + ?Sized,
    {
        self.redirect_to_google_at(session, get_current_timestamp())
            .await
    }

    /// `redirect_to_google` with an explicit clock, in seconds since the unix epoch.
    pub async fn redirect_to_google_at<S>(
        &self,
        session: &S,
        now: u64,
    ) -> Result<LoginRedirect, Error>
    where
        S: SessionValues + ?Sized,
    {
        let (session_id, session_update) = ensure_session_id(session, &self.config.session_id_key)?;
        let state = self.config.anti_forgery.generate(session_id.value(), now)?;
        let login_hint = UserIdentity::from_session(session).map(|user| user.email);

        let document = self.discovery_document().await?;
        let url = AuthorizationRequest::new(&self.config, &document.authorization_endpoint, &state)
            .login_hint(login_hint.as_deref())
            .into_url()?;
        Ok(LoginRedirect {
            url,
            session_update,
        })
    }

    /// Validates Google's redirect back to the application.
    pub async fn validate_callback<S>(
        &self,
        session: &S,
        params: &CallbackParams,
    ) -> Result<UserIdentity, Error>
    where
        S: SessionValues + ?Sized,
    {
        self.validate_callback_at(session, params, get_current_timestamp())
            .await
    }

    /// `validate_callback` with an explicit clock, in seconds since the unix epoch.
    pub async fn validate_callback_at<S>(
        &self,
        session: &S,
        params: &CallbackParams,
        now: u64,
    ) -> Result<UserIdentity, Error>
    where
        S: SessionValues + ?Sized,
    {
        let session_id = session
            .get(&self.config.session_id_key)
            .ok_or(Error::NoSessionId)?;
        let code = params
            .verified_code(&self.config.anti_forgery, session_id, now)
            .inspect_err(|e| warn!("Rejected login callback: {}", e))?;

        let document = self.discovery_document().await?;
        let token_req = TokenExchangeRequest::new(&self.config, &document.token_endpoint, code);
        let tokens = TokenExchangeExe::new(self.client.clone())
            .execute(&token_req)
            .await?;

        let id_token = IDToken::decode_from_row(tokens.id_token())?;
        if let Some(domain) = self.config.domain() {
            if id_token.email_domain() != Some(domain) {
                warn!(
                    "Rejected login from outside the configured domain {}",
                    domain
                );
                return Err(Error::DomainMismatch);
            }
        }

        let info_req =
            UserInfoRequest::new(&document.userinfo_endpoint, tokens.access_token().clone());
        let info = UserInfoExe::new(self.client.clone())
            .execute(&info_req)
            .await?;

        debug!("Login validated for subject {}", id_token.sub);
        Ok(UserIdentity::from_parts(id_token, info))
    }

    /// The identity stored in the session, if it may still be used.
    ///
    /// An expired identity is only returned when `enforce_valid_user` is off.
    pub fn authenticated_identity<S>(&self, session: &S, now: u64) -> Option<UserIdentity>
    where
        S: SessionValues + ?Sized,
    {
        UserIdentity::from_session(session)
            .filter(|user| user.is_valid(now) || !self.config.enforce_valid_user)
    }
}
