// In Google Cloud console
// Set
// - Redirect_url: http://localhost/oauth2callback
// - Host: http://localhost
// And then you will get client_secret.json file from google.
// Set .env file
// ```.env
// client_id="your_client_id"
// client_secret="your_client_secret"
// redirect_uri="http://localhost/oauth2callback"
// state_secret="a long random string"
// # optional, accepted while rotating secrets
// state_secret_retired="the previous state_secret"
// ```
// finally ```cargo run --example axum_server```
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{RawQuery, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use google_auth_state::{
    anti_forgery::AntiForgeryChecker,
    auth::GoogleAuth,
    code::CallbackParams,
    config::GoogleAuthConfig,
    identity::UserIdentity,
    secret::{Secret, SecretSnapshot, StaticSecrets},
    session::SessionUpdate,
};
use http::StatusCode;
use tracing::error;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log settings
    tracing_subscriber::fmt::init();

    // Secrets for the anti-forgery token
    let active = Secret::from(read_env("state_secret")?);
    let retired = dotenvy::var("state_secret_retired")
        .ok()
        .map(Secret::from)
        .into_iter()
        .collect();
    let checker = AntiForgeryChecker::new(StaticSecrets::new(SecretSnapshot::new(active, retired)));

    // Build Config
    let config = GoogleAuthConfig::builder(checker)
        .client_id(&read_env("client_id")?)
        .client_secret(&read_env("client_secret")?)
        .redirect_url(&read_env("redirect_uri")?)
        .build();

    let app_state = AppState {
        auth: Arc::new(GoogleAuth::new(config)?),
        sessions: Arc::default(),
    };
    let listener = tokio::net::TcpListener::bind("0.0.0.0:80").await?;
    // '/oauth2callback': A path that is set in google console
    // '/login': A path to start auth(Show login as google window)
    let app = Router::new()
        .route("/", get(me))
        .route("/login", get(login))
        .route("/oauth2callback", get(call_back))
        .with_state(app_state);

    axum::serve(listener, app).await?;
    anyhow::Ok(())
}

static COOKIE_KEY: &str = "session";

type Session = HashMap<String, String>;

#[derive(Clone)]
struct AppState {
    auth: Arc<GoogleAuth>,
    // Cookie value -> session values (in memory or redis)
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl AppState {
    fn load(&self, jar: &CookieJar) -> (String, Session) {
        let key = jar
            .get(COOKIE_KEY)
            .map(|c| c.value().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default();
        (key, session)
    }

    fn apply(&self, key: &str, update: SessionUpdate) {
        self.sessions
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(update.key, update.value);
    }
}

async fn me(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (_, session) = state.load(&jar);
    let now = jsonwebtoken::get_current_timestamp();
    match state.auth.authenticated_identity(&session, now) {
        Some(user) => (StatusCode::OK, Json(Some(user))),
        None => (StatusCode::UNAUTHORIZED, Json(None::<UserIdentity>)),
    }
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, StatusCode> {
    let (key, session) = state.load(&jar);
    let redirect = state.auth.redirect_to_google(&session).await.map_err(|e| {
        error!("Failed to start login: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    // The session id must be stored before Google redirects back
    if let Some(update) = redirect.session_update {
        state.apply(&key, update);
    }
    let jar = jar.add(Cookie::new(COOKIE_KEY, key));
    Ok((jar, Redirect::to(&redirect.url)))
}

async fn call_back(
    State(state): State<AppState>,
    jar: CookieJar,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, StatusCode> {
    let (key, session) = state.load(&jar);
    let params = CallbackParams::from_query(query.as_deref().unwrap_or_default());

    let user = state
        .auth
        .validate_callback(&session, &params)
        .await
        .map_err(|e| {
            error!("Login failed: {}", e);
            if e.is_anti_forgery() {
                // Stale or forged state, the user should simply log in again
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            }
        })?;

    let update = user
        .to_session_update()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state.apply(&key, update);
    Ok((StatusCode::OK, Json(user)))
}

// Get env from .env file
fn read_env(key: &str) -> anyhow::Result<String> {
    dotenvy::var(key).context("Failed to read env")
}
