//! Domain ownership files the platform fetches from `/callback/<name>.txt`.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use super::AppState;

async fn dir_exists(dir: &FsPath) -> bool {
    tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false)
}

fn missing_dir(dir: &FsPath) -> Response {
    (StatusCode::NOT_FOUND, format!("{} does not exist on the server", dir.display())).into_response()
}

/// Plain `.txt` names only, no separators or parent references.
fn is_servable(name: &str) -> bool {
    name.len() > ".txt".len()
        && name.ends_with(".txt")
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

pub(super) async fn callback_index(State(state): State<AppState>) -> Response {
    let dir = &state.config.callback_dir;
    if !dir_exists(dir).await {
        return missing_dir(dir);
    }
    "callback ready".into_response()
}

pub(super) async fn callback_file(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    if !is_servable(&file) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let dir = &state.config.callback_dir;
    if !dir_exists(dir).await {
        return missing_dir(dir);
    }

    match tokio::fs::read(dir.join(&file)).await {
        Ok(bytes) => ([(CONTENT_TYPE, "text/plain; charset=utf-8")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

pub(super) async fn debug_callback(State(state): State<AppState>) -> Json<Value> {
    let dir = &state.config.callback_dir;
    let exists = dir_exists(dir).await;
    let files = if exists { list(dir).await } else { Vec::new() };

    Json(json!({
        "callback_dir": dir.display().to_string(),
        "exists": exists,
        "files": files,
    }))
}

async fn list(dir: &FsPath) -> Vec<String> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => return vec![format!("<error listing dir: {err}>")],
    };
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => files.push(entry.file_name().to_string_lossy().into_owned()),
            Ok(None) => break,
            Err(err) => {
                files.push(format!("<error listing dir: {err}>"));
                break;
            }
        }
    }
    files.sort();
    files
}
