//! Google OpenID Connect login with a signed anti-forgery `state`.
//!
//! This library implements the server flow of Google's OpenID Connect, where the
//! OAuth `state` parameter is a short-lived JWT bound to the browser's session
//! id and signed with a rotating set of secrets.
//! [google document](https://developers.google.com/identity/openid-connect/openid-connect)
//! # Feature
//! - Per-session random session id, stored in the host's session store
//! - Anti-forgery token generation and verification across active and retired secrets
//! - Generate an authentication request URL for Google (endpoints from the discovery document)
//! - Verify the callback, exchange the code, check the email domain and fetch the profile (using reqwest)
//! - A `UserIdentity` that can be kept in the session
//! # Caution
//! - This library is designed for direct communication with Google over HTTPS.
//! - It does **not** check the signature of the `id_token` returned by Google's token endpoint,
//!   so the `id_token` should not be passed to other components of your application.
//! - For more details, refer to the
//!   [Google OpenID Connect documentation](https://developers.google.com/identity/openid-connect/openid-connect#obtainuserinfo).
//! # Examples
//! For example usage, see `demos/axum_server.rs`.
pub mod anti_forgery;
pub mod auth;
pub mod code;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executer;
pub mod id_token;
pub mod identity;
pub mod secret;
pub mod session;
