use std::path::Path;

use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Body, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::PollConfig;
use crate::error::{PostError, Result};
use crate::tiktok_api::schema::{InitInput, PostMeta, VideoSource};
use crate::tiktok_api::{
    data_of, read, ApiClient, INIT_TIMEOUT, MAX_VIDEO_BYTES, SHORT_TIMEOUT, STATUS_PATH, TRANSFER_TIMEOUT,
};
use crate::util::file_to_body;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub publish_id: String,
    pub upload_url: Option<String>,
    pub variant: &'static str,
}

/// Whole video ready to be PUT in a single request.
pub struct UploadPayload {
    body: Body,
    len: u64,
    mime: String,
}

impl UploadPayload {
    pub fn from_bytes(bytes: Bytes, mime: impl Into<String>) -> Self {
        UploadPayload { len: bytes.len() as u64, body: Body::from(bytes), mime: mime.into() }
    }

    /// Streams the file instead of holding it in memory.
    pub async fn from_file(path: impl AsRef<Path>, mime: impl Into<String>) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(UploadPayload { body: file_to_body(file), len, mime: mime.into() })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// `bytes 0-(n-1)/n`, the payload always travels as one complete chunk.
pub fn content_range(len: u64) -> String {
    format!("bytes 0-{}/{}", len.saturating_sub(1), len)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Processing,
    Ready,
    Failed,
    Unknown,
}

impl PublishState {
    pub fn classify(raw: &str) -> Self {
        let raw = raw.to_ascii_uppercase();
        if raw.contains("FAIL") || raw == "ERROR" {
            PublishState::Failed
        } else if raw.starts_with("PROCESSING") {
            PublishState::Processing
        } else if matches!(raw.as_str(), "READY" | "SUCCESS" | "PUBLISH_COMPLETE" | "SEND_TO_USER_INBOX") {
            PublishState::Ready
        } else {
            PublishState::Unknown
        }
    }

    pub fn is_settled(&self) -> bool {
        *self != PublishState::Processing
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: PublishState,
    pub raw_status: String,
    pub data: Value,
}

pub enum RelaySource {
    Upload(UploadPayload),
    Pull(String),
}

/// Job accepted by init, with the bytes still to send.
pub struct Started {
    pub init: InitOutcome,
    payload: Option<UploadPayload>,
}

impl Started {
    pub fn publish_id(&self) -> &str {
        &self.init.publish_id
    }
}

#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub publish_id: String,
    pub variant: &'static str,
    pub status: Option<StatusReport>,
    pub publish: Option<Value>,
}

impl ApiClient {
    /// Walks the init variants in order and commits to the first accepted one.
    ///
    /// A 4xx, or a 200 without the required fields, moves on to the next shape.
    /// Anything else is terminal.
    pub async fn init(&self, token: &str, input: &InitInput) -> Result<InitOutcome> {
        let mut attempts = 0;
        let mut last: Option<(u16, String)> = None;

        for variant in &self.variants {
            let Some(payload) = (variant.build)(input) else {
                continue;
            };
            attempts += 1;

            let resp = self
                .http
                .post(self.config.endpoint(variant.endpoint.path()))
                .bearer_auth(token)
                .timeout(INIT_TIMEOUT)
                .json(&payload)
                .send()
                .await
                .map_err(PostError::transport("init"))?;
            let (status, body) = read(resp).await.map_err(PostError::transport("init"))?;

            if status == StatusCode::OK {
                if let Some(outcome) = parse_init(&body, input.needs_upload_url(), variant.name) {
                    tracing::info!(variant = variant.name, publish_id = %outcome.publish_id, "init accepted");
                    return Ok(outcome);
                }
            } else if !status.is_client_error() {
                return Err(PostError::Init { status: status.as_u16(), body });
            }

            tracing::warn!(variant = variant.name, status = status.as_u16(), body = %body, "init variant rejected");
            last = Some((status.as_u16(), body));
        }

        let (status, body) = last.unwrap_or_else(|| (0, "no init variant applies to this source".to_owned()));
        Err(PostError::InitExhausted { attempts, status, body })
    }

    pub async fn upload(&self, upload_url: &str, payload: UploadPayload) -> Result<()> {
        let resp = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, payload.mime.as_str())
            .header(CONTENT_LENGTH, payload.len)
            .header(CONTENT_RANGE, content_range(payload.len))
            .timeout(TRANSFER_TIMEOUT)
            .body(payload.body)
            .send()
            .await
            .map_err(PostError::transport("upload"))?;
        let (status, body) = read(resp).await.map_err(PostError::transport("upload"))?;

        if !status.is_success() {
            return Err(PostError::Upload { status: status.as_u16(), body });
        }
        tracing::info!(bytes = payload.len, "upload finished");
        Ok(())
    }

    pub async fn fetch_status(&self, token: &str, publish_id: &str) -> Result<StatusReport> {
        let resp = self
            .http
            .post(self.config.endpoint(STATUS_PATH))
            .bearer_auth(token)
            .timeout(SHORT_TIMEOUT)
            .json(&json!({ "publish_id": publish_id }))
            .send()
            .await
            .map_err(PostError::transport("status"))?;
        let (status, body) = read(resp).await.map_err(PostError::transport("status"))?;

        if !status.is_success() {
            return Err(PostError::Status { status: status.as_u16(), body });
        }
        let Some(data) = data_of(&body) else {
            return Err(PostError::Status { status: status.as_u16(), body });
        };
        let Some(raw_status) = data.get("status").and_then(Value::as_str).map(str::to_owned) else {
            return Err(PostError::Status { status: status.as_u16(), body });
        };

        Ok(StatusReport { state: PublishState::classify(&raw_status), raw_status, data })
    }

    /// Fixed-interval poll, stops at the first settled status. `None` when polling is disabled.
    pub async fn poll_status(&self, token: &str, publish_id: &str, poll: PollConfig) -> Result<Option<StatusReport>> {
        let mut report = None;
        for attempt in 0..poll.attempts {
            if attempt > 0 {
                tokio::time::sleep(poll.interval).await;
            }
            let current = self.fetch_status(token, publish_id).await?;
            tracing::debug!(publish_id, attempt, status = %current.raw_status, "polled status");
            let settled = current.state.is_settled();
            report = Some(current);
            if settled {
                break;
            }
        }
        Ok(report)
    }

    /// Explicit publish for container style accounts. Never retried, it may already have posted.
    pub async fn submit(&self, token: &str, publish_id: &str, open_id: Option<&str>) -> Result<Option<Value>> {
        let Some(url) = self.config.submit_url.clone() else {
            return Ok(None);
        };

        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .timeout(SHORT_TIMEOUT)
            .json(&json!({ "publish_id": publish_id, "open_id": open_id }))
            .send()
            .await
            .map_err(PostError::transport("publish"))?;
        let (status, body) = read(resp).await.map_err(PostError::transport("publish"))?;

        if !status.is_success() {
            return Err(PostError::Publish { status: status.as_u16(), body });
        }
        Ok(Some(serde_json::from_str(&body).unwrap_or(Value::String(body))))
    }

    /// Size checks, then init. Once this returns the job exists remotely.
    pub async fn start(&self, token: &str, source: RelaySource, meta: PostMeta) -> Result<Started> {
        let (source, payload) = match source {
            RelaySource::Upload(payload) => {
                if payload.is_empty() {
                    return Err(PostError::BadRequest("video is empty".to_owned()));
                }
                if payload.len() > MAX_VIDEO_BYTES {
                    return Err(PostError::TooLarge { size: payload.len(), limit: MAX_VIDEO_BYTES });
                }
                (VideoSource::FileUpload { size: payload.len() }, Some(payload))
            }
            RelaySource::Pull(url) => (VideoSource::PullFromUrl { url }, None),
        };

        let init = self.init(token, &InitInput { source, meta }).await?;
        Ok(Started { init, payload })
    }

    /// upload, status poll, submit. Failures carry the publish id so the job can still be looked up.
    pub async fn complete(
        &self,
        token: &str,
        open_id: Option<&str>,
        started: Started,
        poll: PollConfig,
    ) -> Result<RelayOutcome> {
        let publish_id = started.init.publish_id.clone();
        self.finish(token, open_id, started, poll).await.map_err(|e| e.unfinished(&publish_id))
    }

    async fn finish(
        &self,
        token: &str,
        open_id: Option<&str>,
        started: Started,
        poll: PollConfig,
    ) -> Result<RelayOutcome> {
        let Started { init, payload } = started;

        if let Some(payload) = payload {
            let upload_url = init.upload_url.as_deref().ok_or_else(|| PostError::Init {
                status: 200,
                body: "accepted init carried no upload_url".to_owned(),
            })?;
            self.upload(upload_url, payload).await?;
        }

        let status = self.poll_status(token, &init.publish_id, poll).await?;
        let failed = status.as_ref().filter(|report| report.state == PublishState::Failed);

        let publish = match failed {
            Some(report) => {
                tracing::warn!(
                    publish_id = %init.publish_id,
                    status = %report.raw_status,
                    "publish job failed remotely, not submitting"
                );
                None
            }
            None => self.submit(token, &init.publish_id, open_id).await?,
        };

        Ok(RelayOutcome { publish_id: init.publish_id, variant: init.variant, status, publish })
    }
}

fn parse_init(body: &str, needs_upload_url: bool, variant: &'static str) -> Option<InitOutcome> {
    let data = data_of(body)?;
    let publish_id = data.get("publish_id").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let upload_url = data.get("upload_url").and_then(Value::as_str).filter(|s| !s.is_empty());
    if needs_upload_url && upload_url.is_none() {
        return None;
    }
    Some(InitOutcome { publish_id: publish_id.to_owned(), upload_url: upload_url.map(str::to_owned), variant })
}
