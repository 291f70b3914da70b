use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PostError, Result};
use crate::tiktok_api::{read, ApiClient, SHORT_TIMEOUT, TOKEN_PATH};

/// Seconds shaved off `expires_in` so a token is never used right at its edge.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub open_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn expires_at(&self, now: i64) -> i64 {
        now + self.expires_in - EXPIRY_MARGIN_SECS
    }
}

/// Single-use CSRF state, 16 random bytes as unpadded base64url.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

impl ApiClient {
    pub fn authorize_url(&self, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_key", &self.config.client_key)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(","))
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", state)
            .finish();
        let sep = if self.config.auth_url.contains('?') { '&' } else { '?' };
        format!("{}{sep}{query}", self.config.auth_url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.token_request(&[
            ("client_key", self.config.client_key.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.token_request(&[
            ("client_key", self.config.client_key.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let resp = self
            .http
            .post(self.config.endpoint(TOKEN_PATH))
            .header("Cache-Control", "no-cache")
            .timeout(SHORT_TIMEOUT)
            .form(params)
            .send()
            .await
            .map_err(PostError::transport("auth"))?;
        let (status, body) = read(resp).await.map_err(PostError::transport("auth"))?;

        // The endpoint answers 200 with an `error` object on bad codes, so look for the token itself.
        let json: Option<Value> = serde_json::from_str(&body).ok();
        let has_token = json
            .as_ref()
            .and_then(|j| j.get("access_token"))
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty());
        if status != reqwest::StatusCode::OK || !has_token {
            return Err(PostError::TokenExchange { status: status.as_u16(), body });
        }

        serde_json::from_value(json.unwrap_or_default())
            .map_err(|_| PostError::TokenExchange { status: status.as_u16(), body })
    }
}
