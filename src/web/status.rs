use axum::extract::{Query, State};
use axum::Json;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{now, AppState};
use crate::error::{PostError, Result};
use crate::session::SessionData;

#[derive(Debug, Deserialize)]
pub(super) struct StatusQuery {
    publish_id: Option<String>,
}

/// Status of a publish id, which has to be this session's latest one.
pub(super) async fn status(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<StatusQuery>,
) -> (PrivateCookieJar, Result<Json<Value>>) {
    let mut session = SessionData::load(&jar);
    let result = match query.publish_id.filter(|id| !id.is_empty()) {
        None => Err(PostError::BadRequest("publish_id is required".into())),
        Some(id) if session.last_publish_id.as_deref() != Some(id.as_str()) => Err(PostError::UnknownPublishId(id)),
        Some(id) => check(&state, &mut session, &id).await,
    };

    (session.store(jar, state.config.secure_cookies), result.map(Json))
}

pub(super) async fn status_last(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Result<Json<Value>>) {
    let mut session = SessionData::load(&jar);
    let result = match session.last_publish_id.clone() {
        None => Err(PostError::BadRequest("no publish_id in this session yet".into())),
        Some(id) => check(&state, &mut session, &id).await,
    };

    (session.store(jar, state.config.secure_cookies), result.map(Json))
}

async fn check(state: &AppState, session: &mut SessionData, publish_id: &str) -> Result<Value> {
    let token = session.access_token(&state.client, state.config.seed.as_ref(), now()).await?;
    let report = state.client.fetch_status(&token, publish_id).await?;

    Ok(json!({
        "ok": true,
        "publish_id": publish_id,
        "status": report.state,
        "status_raw": report.raw_status,
        "data": report.data,
    }))
}
