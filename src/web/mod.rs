use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::session::cookie_key;
use crate::tiktok_api::{ApiClient, MAX_VIDEO_BYTES};

mod auth;
mod status;
mod upload;
mod verify;

/// Multipart framing and text fields on top of the largest video.
const BODY_LIMIT: usize = MAX_VIDEO_BYTES as usize + 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ApiClient>,
    pub config: Arc<Config>,
    key: Key,
}

impl AppState {
    pub fn new(config: Config, client: ApiClient) -> Self {
        AppState { key: cookie_key(&config.session_secret), client: Arc::new(client), config: Arc::new(config) }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/token", post(auth::seed_token))
        .route("/whoami", get(auth::whoami))
        .route("/logout", get(auth::logout))
        .route("/form", get(upload::form))
        .route("/upload", get(upload::form).post(upload::upload))
        .route("/status", get(status::status))
        .route("/status-last", get(status::status_last))
        .route("/callback/", get(verify::callback_index))
        .route("/callback/{file}", get(verify::callback_file))
        .route("/debug-callback", get(verify::debug_callback))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
