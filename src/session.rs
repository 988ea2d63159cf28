//! Per-browser session identifier that anti-forgery tokens are bound to.
//!
//! The id lives in the host application's session store (usually a cookie)
//! under a single key. It is created on first use and then reused for as long
//! as the session lives.
//!
//! # Known limitation
//! Two requests from the same browser that both arrive before the session
//! cookie is set will each mint a different id. Each login flow stays
//! consistent on its own, but overlapping login attempts from one browser can
//! invalidate each other: only the id that ends up stored will match on the
//! callback.
use std::collections::{BTreeMap, HashMap};

use rand::{TryRngCore, rngs::OsRng};
use tracing::error;

use crate::error::Error;

/// Session store key used when none is configured.
pub const DEFAULT_SESSION_ID_KEY: &str = "google-auth-session-id";

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";
/// 26 characters of 5 bits each, 130 bits in total.
const SESSION_ID_LEN: usize = 26;

/// Read access to the host application's per-browser key-value session.
pub trait SessionValues {
    fn get(&self, key: &str) -> Option<&str>;
}

impl SessionValues for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl SessionValues for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }
}

impl<T: SessionValues + ?Sized> SessionValues for &T {
    fn get(&self, key: &str) -> Option<&str> {
        (**self).get(key)
    }
}

/// A random identifier for one browser session, rendered in radix 32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub(crate) String);

impl SessionId {
    /// Generates a new id from `OsRng`.
    pub fn new() -> Result<Self, Error> {
        let mut bytes = [0u8; SESSION_ID_LEN];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            error!("Failed to generate session id: {:?}", e);
            Error::GenToken
        })?;
        let id = bytes
            .iter()
            .map(|b| ALPHABET[(b & 0x1f) as usize] as char)
            .collect();
        Ok(Self(id))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A write the host must apply to its session store before responding.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub key: String,
    pub value: String,
}

/// Reads the session id stored under `key`, or mints a new one.
///
/// When a new id is minted the returned `SessionUpdate` must be persisted,
/// otherwise the callback will find no session id.
pub fn ensure_session_id<S>(
    session: &S,
    key: &str,
) -> Result<(SessionId, Option<SessionUpdate>), Error>
where
    S: SessionValues + ?Sized,
{
    if let Some(existing) = session.get(key) {
        return Ok((SessionId(existing.to_string()), None));
    }
    let id = SessionId::new()?;
    let update = SessionUpdate {
        key: key.to_string(),
        value: id.0.clone(),
    };
    Ok((id, Some(update)))
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{DEFAULT_SESSION_ID_KEY, SessionId, ensure_session_id};

    #[test]
    fn test_session_id_new() {
        let id = SessionId::new().unwrap();
        assert_eq!(id.value().len(), 26);
        assert!(
            id.value()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='v').contains(&c))
        );
        assert_ne!(id, SessionId::new().unwrap());
    }

    #[test]
    fn test_ensure_session_id_generates() {
        let session: HashMap<String, String> = HashMap::new();
        let (id, update) = ensure_session_id(&session, DEFAULT_SESSION_ID_KEY).unwrap();
        let update = update.unwrap();
        assert_eq!(update.key, DEFAULT_SESSION_ID_KEY);
        assert_eq!(update.value, id.value());
    }

    #[test]
    fn test_ensure_session_id_reuses_existing() {
        let mut session = HashMap::new();
        session.insert("sid".to_string(), "existing".to_string());
        let (id, update) = ensure_session_id(&session, "sid").unwrap();
        assert_eq!(id.value(), "existing");
        assert!(update.is_none());

        // stable across requests
        let (again, _) = ensure_session_id(&session, "sid").unwrap();
        assert_eq!(again, id);
    }
}
