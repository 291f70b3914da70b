use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{now, AppState};
use crate::error::{PostError, Result};
use crate::session::SessionData;
use crate::tiktok_api::oauth::{generate_state, EXPIRY_MARGIN_SECS};

pub(super) async fn login(State(state): State<AppState>, jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    let mut session = SessionData::load(&jar);
    let csrf = generate_state();
    let url = state.client.authorize_url(&csrf);
    session.oauth_state = Some(csrf);

    (session.store(jar, state.config.secure_cookies), Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub(super) async fn callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> (PrivateCookieJar, Result<Json<Value>>) {
    let mut session = SessionData::load(&jar);
    let expected = session.take_state();
    let result = finish_login(&state, &mut session, expected, params).await;

    (session.store(jar, state.config.secure_cookies), result.map(Json))
}

async fn finish_login(
    state: &AppState,
    session: &mut SessionData,
    expected: Option<String>,
    params: CallbackParams,
) -> Result<Value> {
    match (expected.as_deref(), params.state.as_deref()) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => return Err(PostError::StateMismatch),
    }
    // Redirect errors are RFC 6749 error responses, reported as a 400 from the provider.
    if let Some(error) = params.error {
        let body = json!({ "error": error, "error_description": params.error_description });
        return Err(PostError::TokenExchange { status: 400, body: body.to_string() });
    }
    let code = params.code.filter(|c| !c.is_empty()).ok_or_else(|| PostError::BadRequest("missing code".into()))?;

    let token = state.client.exchange_code(&code).await?;
    session.apply_token(&token, now());
    tracing::info!(open_id = ?session.open_id, "login complete");

    Ok(json!({
        "ok": true,
        "open_id": session.open_id,
        "expires_at": session.expires_at,
        "scope": token.scope,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SeedRequest {
    access_token: String,
    #[serde(default)]
    open_id: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Stores a token pasted in by hand, for development without the OAuth redirect.
pub(super) async fn seed_token(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(req): Json<SeedRequest>,
) -> (PrivateCookieJar, Result<Json<Value>>) {
    let mut session = SessionData::load(&jar);
    if req.access_token.trim().is_empty() {
        return (jar, Err(PostError::BadRequest("access_token is empty".into())));
    }

    session.access_token = Some(req.access_token);
    session.open_id = req.open_id;
    session.refresh_token = req.refresh_token;
    session.expires_at = req.expires_in.map(|secs| now() + secs - EXPIRY_MARGIN_SECS);
    let body = json!({ "ok": true, "open_id": session.open_id, "expires_at": session.expires_at });

    (session.store(jar, state.config.secure_cookies), Ok(Json(body)))
}

pub(super) async fn whoami(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Result<Json<Value>>) {
    let mut session = SessionData::load(&jar);
    let result = lookup_user(&state, &mut session).await;

    (session.store(jar, state.config.secure_cookies), result.map(Json))
}

async fn lookup_user(state: &AppState, session: &mut SessionData) -> Result<Value> {
    let token = session.access_token(&state.client, state.config.seed.as_ref(), now()).await?;
    let user = state.client.user_info(&token).await?;
    if session.open_id.is_none() {
        session.open_id = user.get("open_id").and_then(Value::as_str).map(str::to_owned);
    }

    Ok(json!({ "ok": true, "open_id": session.open_id, "user": user }))
}

pub(super) async fn logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Json<Value>) {
    (SessionData::clear(jar), Json(json!({ "ok": true })))
}
