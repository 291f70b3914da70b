use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::config::SeedToken;
use crate::error::{PostError, Result};
use crate::tiktok_api::oauth::TokenResponse;
use crate::tiktok_api::ApiClient;

pub const SESSION_COOKIE: &str = "tok_poster_session";
const SESSION_TTL_DAYS: i64 = 30;

/// Per-browser state, JSON inside one encrypted cookie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Epoch seconds, already includes the safety margin. `None` means unknown.
    pub expires_at: Option<i64>,
    pub open_id: Option<String>,
    pub last_publish_id: Option<String>,
    pub oauth_state: Option<String>,
}

/// Cookie encryption key from an arbitrary length secret.
pub fn cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

impl SessionData {
    /// Missing or unreadable cookies give an empty session.
    pub fn load(jar: &PrivateCookieJar) -> Self {
        jar.get(SESSION_COOKIE)
            .and_then(|c| serde_json::from_str(c.value()).ok())
            .unwrap_or_default()
    }

    pub fn store(&self, jar: PrivateCookieJar, secure: bool) -> PrivateCookieJar {
        let value = match serde_json::to_string(self) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, "session serialization failed");
                return jar;
            }
        };
        let cookie = Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::days(SESSION_TTL_DAYS))
            .build();
        jar.add(cookie)
    }

    pub fn clear(jar: PrivateCookieJar) -> PrivateCookieJar {
        jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"))
    }

    pub fn apply_token(&mut self, token: &TokenResponse, now: i64) {
        self.access_token = Some(token.access_token.clone());
        self.expires_at = Some(token.expires_at(now));
        if let Some(refresh) = &token.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }
        if let Some(open_id) = &token.open_id {
            self.open_id = Some(open_id.clone());
        }
    }

    /// Fills an empty session from the configured development token.
    pub fn seed_from(&mut self, seed: &SeedToken) {
        if self.access_token.is_some() {
            return;
        }
        self.access_token = Some(seed.access_token.clone());
        self.expires_at = None;
        if self.open_id.is_none() {
            self.open_id = seed.open_id.clone();
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Removes the pending OAuth state, it is good for one callback only.
    pub fn take_state(&mut self) -> Option<String> {
        self.oauth_state.take()
    }

    /// Current bearer token, refreshed once if expired.
    ///
    /// A failed refresh keeps the stale token, the platform's own rejection is
    /// more useful to the caller than ours.
    pub async fn access_token(&mut self, client: &ApiClient, seed: Option<&SeedToken>, now: i64) -> Result<String> {
        if let Some(seed) = seed {
            self.seed_from(seed);
        }
        let Some(token) = self.access_token.clone() else {
            return Err(PostError::NotAuthenticated);
        };
        if !self.is_expired(now) {
            return Ok(token);
        }
        let Some(refresh) = self.refresh_token.clone() else {
            return Ok(token);
        };

        match client.refresh_token(&refresh).await {
            Ok(fresh) => {
                tracing::info!("access token refreshed");
                self.apply_token(&fresh, now);
                Ok(fresh.access_token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, using stale token");
                Ok(token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn token(expires_in: i64, refresh: Option<&str>, open_id: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "act.new".into(),
            refresh_token: refresh.map(str::to_owned),
            expires_in,
            open_id: open_id.map(str::to_owned),
            scope: None,
            token_type: None,
        }
    }

    #[test]
    fn apply_token_records_margin_and_keeps_old_refresh() {
        let mut session = SessionData { refresh_token: Some("rft.old".into()), ..Default::default() };
        session.apply_token(&token(3600, None, Some("oid")), 10_000);
        assert_eq!(session.access_token.as_deref(), Some("act.new"));
        assert_eq!(session.expires_at, Some(10_000 + 3600 - 60));
        assert_eq!(session.refresh_token.as_deref(), Some("rft.old"));
        assert_eq!(session.open_id.as_deref(), Some("oid"));
    }

    #[test]
    fn expiry_is_inclusive_and_unknown_never_expires() {
        let session = SessionData { expires_at: Some(100), ..Default::default() };
        assert!(!session.is_expired(99));
        assert!(session.is_expired(100));
        assert!(!SessionData::default().is_expired(i64::MAX));
    }

    #[test]
    fn state_is_single_use() {
        let mut session = SessionData { oauth_state: Some("s".into()), ..Default::default() };
        assert_eq!(session.take_state().as_deref(), Some("s"));
        assert_eq!(session.take_state(), None);
    }

    #[test]
    fn seed_does_not_override_real_login() {
        let seed = SeedToken { access_token: "dev".into(), open_id: Some("dev-oid".into()) };
        let mut empty = SessionData::default();
        empty.seed_from(&seed);
        assert_eq!(empty.access_token.as_deref(), Some("dev"));
        assert_eq!(empty.open_id.as_deref(), Some("dev-oid"));

        let mut logged_in = SessionData { access_token: Some("real".into()), ..Default::default() };
        logged_in.seed_from(&seed);
        assert_eq!(logged_in.access_token.as_deref(), Some("real"));
    }

    #[test]
    fn cookie_key_is_deterministic() {
        assert_eq!(cookie_key("secret").master(), cookie_key("secret").master());
        assert_ne!(cookie_key("secret").master(), cookie_key("other").master());
    }

    #[tokio::test]
    async fn missing_token_is_not_authenticated() {
        let client = ApiClient::new(ApiConfig::new("ck", "cs", "https://example.com/cb"));
        let err = SessionData::default().access_token(&client, None, 0).await.unwrap_err();
        assert!(matches!(err, PostError::NotAuthenticated));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/oauth/token/")
            .with_status(200)
            .with_body(r#"{"access_token":"act.2","expires_in":3600,"refresh_token":"rft.2"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = ApiClient::new(ApiConfig::new("ck", "cs", "https://example.com/cb").with_api_base(server.url()));

        let mut session = SessionData {
            access_token: Some("act.1".into()),
            refresh_token: Some("rft.1".into()),
            expires_at: Some(50),
            ..Default::default()
        };
        let token = session.access_token(&client, None, 100).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "act.2");
        assert_eq!(session.expires_at, Some(100 + 3600 - 60));
        assert_eq!(session.refresh_token.as_deref(), Some("rft.2"));
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_stale_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/oauth/token/")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = ApiClient::new(ApiConfig::new("ck", "cs", "https://example.com/cb").with_api_base(server.url()));

        let mut session = SessionData {
            access_token: Some("act.1".into()),
            refresh_token: Some("rft.1".into()),
            expires_at: Some(50),
            ..Default::default()
        };
        let token = session.access_token(&client, None, 100).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "act.1");
        assert_eq!(session.access_token.as_deref(), Some("act.1"));
    }
}
