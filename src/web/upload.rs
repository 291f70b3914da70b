use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::Html;
use axum::Json;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{now, AppState};
use crate::error::{PostError, Result};
use crate::session::SessionData;
use crate::tiktok_api::publish::{RelaySource, UploadPayload};
use crate::tiktok_api::schema::PostMeta;
use crate::util::{download_to_temp, filename_from_url, guess_mime, Downloaded};

const FORM_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Upload video</title></head>
<body>
<h1>Upload video</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
  <p><input type="file" name="file" accept="video/*" required></p>
  <p><input type="text" name="caption" placeholder="Caption"></p>
  <p>
    <select name="privacy_level">
      <option value="SELF_ONLY">Only me</option>
      <option value="MUTUAL_FOLLOW_FRIENDS">Friends</option>
      <option value="FOLLOWER_OF_CREATOR">Followers</option>
      <option value="PUBLIC_TO_EVERYONE">Everyone</option>
    </select>
  </p>
  <p><input type="number" name="cover_ms" min="0" value="0"> cover frame (ms)</p>
  <p>
    <label><input type="checkbox" name="disable_comment"> no comments</label>
    <label><input type="checkbox" name="disable_duet"> no duet</label>
    <label><input type="checkbox" name="disable_stitch"> no stitch</label>
  </p>
  <p><button type="submit">Upload</button></p>
</form>
<p><a href="/status-last">Last status</a> | <a href="/whoami">Who am I</a> | <a href="/login">Login</a></p>
</body>
</html>
"#;

pub(super) async fn form() -> Html<&'static str> {
    Html(FORM_HTML)
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum UrlMode {
    /// Download here, then upload as a file.
    #[default]
    Relay,
    /// Let the platform fetch the URL itself, needs a verified domain.
    Pull,
}

#[derive(Debug, Deserialize)]
struct UrlUpload {
    video_url: String,
    #[serde(default)]
    mode: UrlMode,
    #[serde(flatten)]
    meta: PostMeta,
}

/// Everything needed to start the handshake. `_download` holds the temp file open until the upload is done.
struct Prepared {
    source: RelaySource,
    meta: PostMeta,
    _download: Option<Downloaded>,
}

/// Multipart file upload or JSON `{video_url, ...}` submission.
pub(super) async fn upload(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    req: Request,
) -> (PrivateCookieJar, Result<Json<Value>>) {
    let mut session = SessionData::load(&jar);
    let result = relay(&state, &mut session, req).await;

    (session.store(jar, state.config.secure_cookies), result.map(Json))
}

async fn relay(state: &AppState, session: &mut SessionData, req: Request) -> Result<Value> {
    let token = session.access_token(&state.client, state.config.seed.as_ref(), now()).await?;

    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    let prepared = if is_json { from_json(state, req).await? } else { from_multipart(req).await? };

    let started = state.client.start(&token, prepared.source, prepared.meta).await?;
    session.last_publish_id = Some(started.publish_id().to_owned());

    let outcome = state.client.complete(&token, session.open_id.as_deref(), started, state.config.poll).await?;
    tracing::info!(publish_id = %outcome.publish_id, variant = outcome.variant, "video relayed");

    Ok(json!({
        "ok": true,
        "publish_id": outcome.publish_id,
        "variant": outcome.variant,
        "status": outcome.status.as_ref().map(|s| s.state),
        "status_raw": outcome.status.as_ref().map(|s| s.raw_status.clone()),
        "publish": outcome.publish,
    }))
}

async fn from_multipart(req: Request) -> Result<Prepared> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| PostError::BadRequest(format!("expected multipart form: {e}")))?;

    let mut meta = PostMeta::default();
    let mut file: Option<(String, String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PostError::BadRequest(format!("failed to read multipart: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if name == "file" {
            let filename = field.file_name().unwrap_or("video.mp4").to_owned();
            let mime = field
                .content_type()
                .filter(|ct| ct.starts_with("video/"))
                .unwrap_or_else(|| guess_mime(&filename))
                .to_owned();
            let data = field
                .bytes()
                .await
                .map_err(|e| PostError::BadRequest(format!("failed to read file data: {e}")))?;
            file = Some((filename, mime, data));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| PostError::BadRequest(format!("failed to read field {name}: {e}")))?;
        match name.as_str() {
            "caption" | "title" => meta.caption = value,
            "privacy_level" => meta.privacy_level = value.parse().map_err(PostError::BadRequest)?,
            "cover_ms" | "video_cover_timestamp_ms" => {
                meta.cover_timestamp_ms = value
                    .trim()
                    .parse()
                    .map_err(|_| PostError::BadRequest(format!("cover_ms={value} is not a number")))?;
            }
            "disable_comment" => meta.disable_comment = checkbox(&value),
            "disable_duet" => meta.disable_duet = checkbox(&value),
            "disable_stitch" => meta.disable_stitch = checkbox(&value),
            _ => {}
        }
    }

    let (filename, mime, data) = file.ok_or_else(|| PostError::BadRequest("missing file field".into()))?;
    tracing::debug!(%filename, %mime, bytes = data.len(), "received upload");
    Ok(Prepared { source: RelaySource::Upload(UploadPayload::from_bytes(data, mime)), meta, _download: None })
}

async fn from_json(state: &AppState, req: Request) -> Result<Prepared> {
    let Json(body) = Json::<UrlUpload>::from_request(req, &())
        .await
        .map_err(|e| PostError::BadRequest(e.body_text()))?;

    let parsed = url::Url::parse(&body.video_url)
        .map_err(|e| PostError::BadRequest(format!("video_url is invalid: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PostError::BadRequest("video_url must be http or https".into()));
    }
    if body.mode == UrlMode::Pull {
        return Ok(Prepared { source: RelaySource::Pull(body.video_url), meta: body.meta, _download: None });
    }

    let filename = filename_from_url(&body.video_url);
    let downloaded = download_to_temp(state.client.http(), &body.video_url, state.config.max_download_bytes).await?;
    tracing::info!(%filename, bytes = downloaded.size, "source video downloaded");
    let mime = downloaded
        .content_type
        .as_deref()
        .filter(|ct| ct.starts_with("video/"))
        .unwrap_or_else(|| guess_mime(&filename))
        .to_owned();
    let payload = UploadPayload::from_file(downloaded.file.path(), mime).await?;

    Ok(Prepared { source: RelaySource::Upload(payload), meta: body.meta, _download: Some(downloaded) })
}

fn checkbox(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes")
}
