//! Anti-forgery tokens carried in the OAuth `state` parameter.
//!
//! Instead of storing a random CSRF value server side, the `state` parameter is
//! a short-lived JWT that names the browser's session id. On the callback the
//! token is checked against the secrets currently offered by a `SecretSource`
//! and against the session id found in the caller's session store.
//!
//! # Flow
//! 1. `AntiForgeryChecker::generate` signs `{rsid: <session id>, exp: now + 60s}`
//!    with the active secret.
//! 2. The token travels to Google and back as `state`.
//! 3. `AntiForgeryChecker::verify` checks, in this order: the token parses, its
//!    signature matches the active or a retired secret, its header algorithm is
//!    the configured one, it has not expired, and its `rsid` is the caller's
//!    session id.
//!
//! # Example
//! ```rust,no_run
//! use google_auth_state::{
//!     anti_forgery::AntiForgeryChecker,
//!     secret::{Secret, SecretSnapshot, StaticSecrets},
//! };
//!
//! let checker = AntiForgeryChecker::new(StaticSecrets::new(SecretSnapshot::single(
//!     Secret::from("change-me"),
//! )));
//! let now = jsonwebtoken::get_current_timestamp();
//! let token = checker.generate("session-id", now).unwrap();
//! assert!(checker.verify(token.value(), "session-id", now + 30).is_ok());
//! ```
use std::{fmt, sync::Arc, time::Duration};

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    error::Error,
    secret::{Attempt, SecretSource},
};

/// How long a token stays valid after it is generated.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AntiForgeryClaims {
    /// Session id of the browser that started the login.
    rsid: String,
    exp: u64,
}

/// A signed anti-forgery token, ready to be used as the OAuth `state` value.
///
/// The compact JWT form only contains URL-safe characters.
#[derive(Debug, Clone, PartialEq)]
pub struct AntiForgeryToken(pub(crate) String);

impl AntiForgeryToken {
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Signs and verifies anti-forgery tokens with secrets from a `SecretSource`.
#[derive(Clone)]
pub struct AntiForgeryChecker {
    secrets: Arc<dyn SecretSource>,
    algorithm: Algorithm,
}

impl AntiForgeryChecker {
    /// Uses `HS256`.
    pub fn new<S>(secrets: S) -> Self
    where
        S: SecretSource + 'static,
    {
        Self::with_algorithm(secrets, Algorithm::HS256)
    }

    /// `algorithm` must be one of the HMAC algorithms (`HS256`, `HS384`, `HS512`).
    pub fn with_algorithm<S>(secrets: S, algorithm: Algorithm) -> Self
    where
        S: SecretSource + 'static,
    {
        Self {
            secrets: Arc::new(secrets),
            algorithm,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Signs a token for `session_id` that expires `TOKEN_LIFETIME` after `now`.
    ///
    /// `now` is in seconds since the unix epoch.
    pub fn generate(&self, session_id: &str, now: u64) -> Result<AntiForgeryToken, Error> {
        let claims = AntiForgeryClaims {
            rsid: session_id.to_string(),
            exp: now.saturating_add(TOKEN_LIFETIME.as_secs()),
        };
        let snapshot = self.secrets.snapshot();
        let key = EncodingKey::from_secret(snapshot.active().as_bytes());
        let token = encode(&Header::new(self.algorithm), &claims, &key).map_err(|e| {
            error!("Failed to sign anti-forgery token: {}", e);
            Error::GenToken
        })?;
        Ok(AntiForgeryToken(token))
    }

    /// Checks that `token` was issued by us for `session_id` and is still fresh.
    pub fn verify(&self, token: &str, session_id: &str, now: u64) -> Result<(), Error> {
        let header = decode_header(token).map_err(|e| {
            debug!("Failed to parse anti-forgery token: {}", e);
            Error::MalformedToken
        })?;
        parse_unverified(token)?;

        // Verify with the algorithm the token claims, the comparison with the
        // configured one happens once the signature is known to be ours.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let snapshot = self.secrets.snapshot();
        let data = snapshot
            .decode(
                |secret| {
                    decode::<AntiForgeryClaims>(
                        token,
                        &DecodingKey::from_secret(secret.as_bytes()),
                        &validation,
                    )
                },
                classify,
            )
            .map_err(|e| {
                debug!("Anti-forgery token rejected: {}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature => Error::InvalidSignature,
                    ErrorKind::InvalidAlgorithm => Error::AlgorithmMismatch,
                    _ => Error::MalformedToken,
                }
            })?;

        if data.header.alg != self.algorithm {
            return Err(Error::AlgorithmMismatch);
        }
        if now > data.claims.exp {
            return Err(Error::Expired);
        }
        if data.claims.rsid != session_id {
            return Err(Error::SessionMismatch);
        }
        Ok(())
    }
}

impl fmt::Debug for AntiForgeryChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AntiForgeryChecker")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Checks that the claims and signature segments parse, without trusting them.
///
/// Keeps an unreadable token from being reported as signed by an unknown secret.
fn parse_unverified(token: &str) -> Result<AntiForgeryClaims, Error> {
    let mut segments = token.split('.');
    let (Some(_), Some(claims), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        debug!("Anti-forgery token does not have three segments");
        return Err(Error::MalformedToken);
    };
    BASE64_URL_SAFE_NO_PAD.decode(signature).map_err(|e| {
        debug!("Failed to decode anti-forgery signature: {}", e);
        Error::MalformedToken
    })?;
    let claims = BASE64_URL_SAFE_NO_PAD.decode(claims).map_err(|e| {
        debug!("Failed to decode anti-forgery claims: {}", e);
        Error::MalformedToken
    })?;
    serde_json::from_slice(&claims).map_err(|e| {
        debug!("Failed to parse anti-forgery claims: {}", e);
        Error::MalformedToken
    })
}

/// Only a signature mismatch is worth trying against another secret.
fn classify(e: &jsonwebtoken::errors::Error) -> Attempt {
    match e.kind() {
        ErrorKind::InvalidSignature => Attempt::Retry,
        _ => Attempt::Conclusive,
    }
}
