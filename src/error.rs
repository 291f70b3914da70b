use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Everything that can go wrong between the browser and the remote platform.
///
/// Remote failures keep the HTTP status and the raw body the platform sent back,
/// those bodies are the only useful debugging signal we get.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },

    #[error("oauth state mismatch")]
    StateMismatch,

    #[error("not authenticated, visit /login first")]
    NotAuthenticated,

    #[error("init failed ({status}): {body}")]
    Init { status: u16, body: String },

    #[error("init rejected by all {attempts} payload variants, last response ({status}): {body}")]
    InitExhausted { attempts: usize, status: u16, body: String },

    #[error("upload failed ({status}): {body}")]
    Upload { status: u16, body: String },

    #[error("status fetch failed ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("publish failed ({status}): {body}")]
    Publish { status: u16, body: String },

    #[error("user info failed ({status}): {body}")]
    UserInfo { status: u16, body: String },

    /// `status` is set when the source answered, `None` for transport or size failures.
    #[error("download failed: {body}")]
    Download { status: Option<u16>, body: String },

    #[error("video is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("{0}")]
    BadRequest(String),

    #[error("publish_id {0} is not the last one in this session")]
    UnknownPublishId(String),

    #[error("{step} request failed: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// A step after init failed, the remote job still exists under `publish_id`.
    #[error("{source}")]
    Unfinished {
        publish_id: String,
        #[source]
        source: Box<PostError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PostError> = std::result::Result<T, E>;

impl PostError {
    /// For `map_err` on a request that never got an answer.
    pub fn transport(step: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| PostError::Transport { step, source }
    }

    pub fn unfinished(self, publish_id: &str) -> Self {
        match self {
            already @ PostError::Unfinished { .. } => already,
            source => PostError::Unfinished { publish_id: publish_id.to_owned(), source: Box::new(source) },
        }
    }

    /// Handshake step the error belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            Self::TokenExchange { .. } | Self::StateMismatch | Self::NotAuthenticated => "auth",
            Self::Init { .. } | Self::InitExhausted { .. } => "init",
            Self::Upload { .. } | Self::TooLarge { .. } => "upload",
            Self::Status { .. } | Self::UnknownPublishId(_) => "status",
            Self::Publish { .. } => "publish",
            Self::UserInfo { .. } => "whoami",
            Self::Download { .. } => "download",
            Self::BadRequest(_) => "request",
            Self::Transport { step, .. } => *step,
            Self::Unfinished { source, .. } => source.step(),
            Self::Io(_) => "io",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenExchange { .. } => "TokenExchangeError",
            Self::StateMismatch => "StateMismatchError",
            Self::NotAuthenticated => "NotAuthenticated",
            Self::Init { .. } => "InitError",
            Self::InitExhausted { .. } => "InitExhaustedError",
            Self::Upload { .. } | Self::TooLarge { .. } => "UploadError",
            Self::Status { .. } => "StatusError",
            Self::Publish { .. } => "PublishError",
            Self::UserInfo { .. } => "UserInfoError",
            Self::Download { .. } => "DownloadError",
            Self::BadRequest(_) | Self::UnknownPublishId(_) => "BadRequest",
            Self::Transport { .. } => "TransportError",
            Self::Unfinished { source, .. } => source.kind(),
            Self::Io(_) => "IoError",
        }
    }

    /// Remote status and raw body, when the platform answered at all.
    pub fn remote(&self) -> Option<(u16, &str)> {
        match self {
            Self::TokenExchange { status, body }
            | Self::Init { status, body }
            | Self::InitExhausted { status, body, .. }
            | Self::Upload { status, body }
            | Self::Status { status, body }
            | Self::Publish { status, body }
            | Self::UserInfo { status, body } => Some((*status, body.as_str())),
            Self::Download { status: Some(status), body } => Some((*status, body.as_str())),
            Self::Unfinished { source, .. } => source.remote(),
            _ => None,
        }
    }

    fn http_status(&self) -> StatusCode {
        match self {
            Self::StateMismatch | Self::BadRequest(_) | Self::UnknownPublishId(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport { source, .. } if source.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Unfinished { source, .. } => source.http_status(),
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Parses a raw remote body as JSON when possible so callers get structure back,
/// falling back to the plain string.
fn raw_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_owned()))
}

impl IntoResponse for PostError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(error = %self, step = self.step(), "request failed");
        } else {
            tracing::warn!(error = %self, step = self.step(), "request rejected");
        }

        let mut body = json!({
            "ok": false,
            "error": self.kind(),
            "step": self.step(),
            "message": self.to_string(),
        });
        if let Some((remote_status, remote_body)) = self.remote() {
            body["status"] = json!(remote_status);
            body["body"] = raw_body(remote_body);
        }
        match &self {
            Self::InitExhausted { attempts, .. } => body["attempts"] = json!(attempts),
            Self::Unfinished { publish_id, .. } => body["publish_id"] = json!(publish_id),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
