use std::time::Duration;

use serde_json::Value;

use crate::config::ApiConfig;
use crate::tiktok_api::schema::{default_variants, InitVariant};

pub mod oauth;
pub mod publish;
pub mod schema;
pub mod user;

/// Largest single-request upload the platform accepts.
pub const MAX_VIDEO_BYTES: u64 = 287_762_808;

pub const TOKEN_PATH: &str = "v2/oauth/token/";
pub const STATUS_PATH: &str = "v2/post/publish/status/fetch/";
pub const USER_INFO_PATH: &str = "v2/user/info/";

const SHORT_TIMEOUT: Duration = Duration::from_secs(15);
const INIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for the Content Posting API and its OAuth endpoints.
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    variants: Vec<InitVariant>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        ApiClient { http: reqwest::Client::new(), config, variants: default_variants() }
    }

    /// Replaces the ordered list of init payload shapes.
    pub fn with_variants(mut self, variants: Vec<InitVariant>) -> Self {
        self.variants = variants;
        self
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Status and body of a response, body read even on failure.
async fn read(resp: reqwest::Response) -> reqwest::Result<(reqwest::StatusCode, String)> {
    let status = resp.status();
    let body = resp.text().await?;
    Ok((status, body))
}

/// `data` object of the platform's `{data, error}` envelope.
fn data_of(body: &str) -> Option<Value> {
    let mut json: Value = serde_json::from_str(body).ok()?;
    match json.get_mut("data") {
        Some(data) if data.is_object() => Some(data.take()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_of_unwraps_envelope() {
        let body = r#"{"data":{"publish_id":"p1"},"error":{"code":"ok","message":""}}"#;
        assert_eq!(data_of(body).unwrap()["publish_id"], "p1");
    }

    #[test]
    fn data_of_rejects_missing_or_garbage() {
        assert!(data_of(r#"{"error":{"code":"access_token_invalid"}}"#).is_none());
        assert!(data_of("<html>bad gateway</html>").is_none());
        assert!(data_of(r#"{"data":null}"#).is_none());
    }
}
