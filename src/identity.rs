//! The verified user identity produced by a successful login.
//!
//! `UserIdentity` combines the claims of the ID token with the profile returned
//! by Google's user info endpoint. It can be stored in the host's session as
//! JSON and read back on later requests.
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    id_token::{AccessToken, IDToken},
    session::{SessionUpdate, SessionValues},
};

/// A request to Google's user info endpoint.
#[derive(Debug, Clone)]
pub struct UserInfoRequest {
    userinfo_endpoint: String,
    access_token: AccessToken,
}

impl UserInfoRequest {
    pub fn new(userinfo_endpoint: &str, access_token: AccessToken) -> Self {
        Self {
            userinfo_endpoint: userinfo_endpoint.to_string(),
            access_token,
        }
    }

    pub fn userinfo_endpoint(&self) -> &str {
        &self.userinfo_endpoint
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }
}

/// Profile fields from the user info endpoint.
///
/// Google leaves out names it does not have, so they default to empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    pub picture: Option<String>,
}

/// A user whose login has been fully validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub sub: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Expiry of the ID token, in seconds since the unix epoch.
    pub exp: u64,
    pub avatar_url: Option<String>,
}

impl UserIdentity {
    /// Session store key the identity is kept under.
    pub const SESSION_KEY: &'static str = "userIdentity";

    pub(crate) fn from_parts(id_token: IDToken, info: UserInfo) -> Self {
        Self {
            sub: id_token.sub,
            email: id_token.email,
            first_name: info.given_name,
            last_name: info.family_name,
            exp: id_token.exp,
            avatar_url: info.picture,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// The local part of the email address.
    pub fn username(&self) -> &str {
        self.email
            .split_once('@')
            .map_or(self.email.as_str(), |(local, _)| local)
    }

    /// `true` while the ID token this identity came from has not expired.
    ///
    /// Expired means `now > exp`, the same rule the anti-forgery token uses.
    pub fn is_valid(&self, now: u64) -> bool {
        now <= self.exp
    }

    /// The session write that stores this identity.
    pub fn to_session_update(&self) -> Result<SessionUpdate, serde_json::Error> {
        Ok(SessionUpdate {
            key: Self::SESSION_KEY.to_string(),
            value: serde_json::to_string(self)?,
        })
    }

    /// Reads an identity stored with `to_session_update`.
    ///
    /// A value that no longer parses is treated as absent.
    pub fn from_session<S>(session: &S) -> Option<Self>
    where
        S: SessionValues + ?Sized,
    {
        let raw = session.get(Self::SESSION_KEY)?;
        serde_json::from_str(raw)
            .map_err(|e| warn!("Ignoring unreadable identity in session: {}", e))
            .ok()
    }
}
