use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://open.tiktokapis.com/";
pub const DEFAULT_AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
pub const DEFAULT_SCOPES: &str = "user.info.basic,video.publish,video.upload";

/// Credentials and endpoints for the remote platform.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub client_key: String,
    pub client_secret: String,
    /// Must match the value registered with the platform byte for byte, so it is kept as typed.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Always ends with `/`.
    pub api_base: String,
    /// Authorization page, query parameters are appended to it.
    pub auth_url: String,
    /// Separate publish endpoint for container style accounts. Unset means init already publishes.
    pub submit_url: Option<Url>,
}

impl ApiConfig {
    pub fn new(
        client_key: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        ApiConfig {
            client_key: client_key.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: split_scopes(DEFAULT_SCOPES),
            api_base: DEFAULT_API_BASE.to_owned(),
            auth_url: DEFAULT_AUTH_URL.to_owned(),
            submit_url: None,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.api_base = base;
        self
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_submit_url(mut self, url: Url) -> Self {
        self.submit_url = Some(url);
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        self.api_base.clone() + path
    }
}

/// Token pasted in from the developer portal, skips the OAuth dance.
#[derive(Debug, Clone)]
pub struct SeedToken {
    pub access_token: String,
    pub open_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig { attempts: 12, interval: Duration::from_secs(5) }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub session_secret: String,
    pub seed: Option<SeedToken>,
    pub callback_dir: PathBuf,
    pub addr: SocketAddr,
    pub poll: PollConfig,
    pub max_download_bytes: u64,
    pub secure_cookies: bool,
}

impl Config {
    pub fn new(api: ApiConfig, session_secret: impl Into<String>) -> Self {
        Config {
            api,
            session_secret: session_secret.into(),
            seed: None,
            callback_dir: PathBuf::from("callback"),
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            poll: PollConfig::default(),
            max_download_bytes: crate::tiktok_api::MAX_VIDEO_BYTES,
            secure_cookies: false,
        }
    }

    pub fn with_seed(mut self, seed: SeedToken) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_callback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.callback_dir = dir.into();
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Download cap for URL submissions, never above the upload limit.
    pub fn with_max_download_bytes(mut self, max: u64) -> Self {
        self.max_download_bytes = max.min(crate::tiktok_api::MAX_VIDEO_BYTES);
        self
    }

    /// Reads `.env` (if any) and the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let client_key = required("TIKTOK_CLIENT_KEY")?;
        let client_secret = required("TIKTOK_CLIENT_SECRET")?;
        let redirect_uri = required("TIKTOK_REDIRECT_URI")?;
        Url::parse(&redirect_uri).context("TIKTOK_REDIRECT_URI is not a valid URL")?;
        let session_secret = required("SESSION_SECRET")?;

        let mut api = ApiConfig::new(client_key, client_secret, redirect_uri);
        if let Some(base) = optional("TIKTOK_API_BASE") {
            api = api.with_api_base(base);
        }
        if let Some(auth) = optional("TIKTOK_AUTH_URL") {
            Url::parse(&auth).context("TIKTOK_AUTH_URL is not a valid URL")?;
            api = api.with_auth_url(auth);
        }
        if let Some(scopes) = optional("TIKTOK_SCOPES") {
            api = api.with_scopes(split_scopes(&scopes));
        }
        if let Some(submit) = optional("TIKTOK_SUBMIT_URL") {
            api = api.with_submit_url(Url::parse(&submit).context("TIKTOK_SUBMIT_URL is not a valid URL")?);
        }

        let mut config = Config::new(api, session_secret);

        if let Some(access_token) = optional("TIKTOK_ACCESS_TOKEN") {
            config = config.with_seed(SeedToken { access_token, open_id: optional("TIKTOK_OPEN_ID") });
        }
        if let Some(dir) = optional("CALLBACK_DIR") {
            config.callback_dir = PathBuf::from(dir);
        }

        let host: std::net::IpAddr = parse_or("HOST", [0, 0, 0, 0].into())?;
        let port: u16 = parse_or("PORT", 8000)?;
        config.addr = SocketAddr::new(host, port);

        config.poll = PollConfig {
            attempts: parse_or("POLL_ATTEMPTS", config.poll.attempts)?,
            interval: Duration::from_secs(parse_or("POLL_INTERVAL_SECS", config.poll.interval.as_secs())?),
        };
        let max_download_bytes = parse_or("MAX_DOWNLOAD_BYTES", config.max_download_bytes)?;
        config = config.with_max_download_bytes(max_download_bytes);
        config.secure_cookies = parse_or("SECURE_COOKIES", config.secure_cookies)?;

        Ok(config)
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).with_context(|| format!("{name} is required"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{name}={raw} is invalid")),
        None => Ok(default),
    }
}

pub fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}
