//! Google's OpenID Connect discovery document.
//!
//! The document is fetched the first time an endpoint is needed and kept for
//! the lifetime of the `Discovery` value. Concurrent first callers wait on the
//! same fetch instead of starting their own. A failed fetch is not cached, so
//! the next caller tries again.
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::{
    error::Error,
    executer::{DiscoveryExe, Executer},
};

/// Endpoint URLs published by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveryDocument {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

/// A request for the discovery document at `url`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    pub(crate) url: String,
}

impl DiscoveryRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Lazily fetched, never refreshed discovery document.
#[derive(Debug)]
pub struct Discovery {
    request: DiscoveryRequest,
    document: OnceCell<DiscoveryDocument>,
}

impl Discovery {
    pub fn new(url: &str) -> Self {
        Self {
            request: DiscoveryRequest::new(url),
            document: OnceCell::new(),
        }
    }

    /// Returns the cached document, fetching it with `exe` if nobody has yet.
    pub async fn document(&self, exe: &DiscoveryExe) -> Result<&DiscoveryDocument, Error> {
        self.document
            .get_or_try_init(|| exe.execute(&self.request))
            .await
    }

    /// The document, if it has been fetched already.
    pub fn cached(&self) -> Option<&DiscoveryDocument> {
        self.document.get()
    }
}
