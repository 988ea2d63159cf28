//! Signing secrets and their rotation.
//!
//! A `SecretSnapshot` holds one **active** secret, used to sign new tokens, and
//! an ordered list of **retired** secrets that are still accepted when verifying.
//! Rotating a secret means making a new one active while the previous one moves
//! into the retired list, so tokens signed moments before the rotation keep
//! verifying until the old secret is dropped.
//!
//! Where the secrets come from is up to the host application, through the
//! `SecretSource` trait. Two sources are provided:
//! - `StaticSecrets`: a fixed snapshot.
//! - `RotatingSecrets`: an in-process snapshot that can be rotated at runtime.
//!
//! # Example
//! ```rust,no_run
//! use google_auth_state::secret::{RotatingSecrets, Secret, SecretSource};
//!
//! let secrets = RotatingSecrets::new(Secret::from("first-secret"));
//! secrets.rotate(Secret::from("second-secret"));
//!
//! let snapshot = secrets.snapshot();
//! assert_eq!(snapshot.retired().len(), 1);
//! ```
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Key material for signing anti-forgery tokens.
#[derive(Clone, PartialEq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Outcome of trying one candidate secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The failure is specific to this secret; try the next one.
    Retry,
    /// The failure would be the same with any secret; stop here.
    Conclusive,
}

/// The secrets valid at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretSnapshot {
    active: Secret,
    retired: Vec<Secret>,
}

impl SecretSnapshot {
    pub fn new(active: Secret, retired: Vec<Secret>) -> Self {
        Self { active, retired }
    }

    /// A snapshot with only an active secret.
    pub fn single(active: Secret) -> Self {
        Self::new(active, Vec::new())
    }

    /// The secret used for new signatures.
    pub fn active(&self) -> &Secret {
        &self.active
    }

    /// Secrets that are still accepted but never used for signing.
    pub fn retired(&self) -> &[Secret] {
        &self.retired
    }

    /// Active secret first, then the retired ones in order.
    pub fn candidates(&self) -> impl Iterator<Item = &Secret> {
        std::iter::once(&self.active).chain(self.retired.iter())
    }

    /// Runs `decode` against each candidate secret in order.
    ///
    /// Returns the first success. A failure classified as `Attempt::Retry` moves
    /// on to the next candidate, anything `Attempt::Conclusive` is returned
    /// immediately. When every candidate asks for a retry, the last failure is
    /// returned.
    pub fn decode<T, E, D, C>(&self, mut decode: D, classify: C) -> Result<T, E>
    where
        D: FnMut(&Secret) -> Result<T, E>,
        C: Fn(&E) -> Attempt,
    {
        let mut last = match decode(&self.active) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        if classify(&last) == Attempt::Conclusive {
            return Err(last);
        }
        for secret in &self.retired {
            match decode(secret) {
                Ok(v) => return Ok(v),
                Err(e) if classify(&e) == Attempt::Retry => last = e,
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }
}

/// Supplies the secrets currently valid for signing and verification.
///
/// Called once per sign or verify operation, so implementations must be cheap
/// and must not block. The returned snapshot is never cached by this crate.
pub trait SecretSource: Send + Sync {
    fn snapshot(&self) -> Arc<SecretSnapshot>;
}

/// A source whose snapshot never changes.
#[derive(Debug, Clone)]
pub struct StaticSecrets(Arc<SecretSnapshot>);

impl StaticSecrets {
    pub fn new(snapshot: SecretSnapshot) -> Self {
        Self(Arc::new(snapshot))
    }
}

impl SecretSource for StaticSecrets {
    fn snapshot(&self) -> Arc<SecretSnapshot> {
        Arc::clone(&self.0)
    }
}

/// A source that can be rotated while the application is running.
///
/// Readers always see a complete snapshot; a rotation swaps the whole snapshot.
#[derive(Debug)]
pub struct RotatingSecrets {
    current: RwLock<Arc<SecretSnapshot>>,
}

impl RotatingSecrets {
    pub fn new(active: Secret) -> Self {
        Self::from_snapshot(SecretSnapshot::single(active))
    }

    pub fn from_snapshot(snapshot: SecretSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Makes `next` the active secret and retires the previous active one.
    ///
    /// The previous secret becomes the first retired candidate.
    pub fn rotate(&self, next: Secret) {
        self.replace(|current| {
            let mut retired = Vec::with_capacity(current.retired.len() + 1);
            retired.push(current.active.clone());
            retired.extend(current.retired.iter().cloned());
            SecretSnapshot::new(next, retired)
        });
    }

    /// Drops the oldest retired secret. Tokens signed with it stop verifying.
    pub fn retire_oldest(&self) -> Option<Secret> {
        let mut dropped = None;
        self.replace(|current| {
            let mut retired = current.retired.clone();
            dropped = retired.pop();
            SecretSnapshot::new(current.active.clone(), retired)
        });
        dropped
    }

    /// Replaces the retired list, keeping the active secret.
    pub fn set_retired(&self, retired: Vec<Secret>) {
        self.replace(|current| SecretSnapshot::new(current.active.clone(), retired));
    }

    fn replace(&self, f: impl FnOnce(&SecretSnapshot) -> SecretSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(&guard);
        *guard = Arc::new(next);
    }
}

impl SecretSource for RotatingSecrets {
    fn snapshot(&self) -> Arc<SecretSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }
}

impl<S: SecretSource + ?Sized> SecretSource for Arc<S> {
    fn snapshot(&self) -> Arc<SecretSnapshot> {
        (**self).snapshot()
    }
}
