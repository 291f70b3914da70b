use serde_json::Value;

use crate::error::{PostError, Result};
use crate::tiktok_api::{data_of, read, ApiClient, SHORT_TIMEOUT, USER_INFO_PATH};

const USER_FIELDS: &str = "open_id,union_id,avatar_url,display_name";

impl ApiClient {
    /// `data.user` of the user info endpoint, as sent.
    pub async fn user_info(&self, token: &str) -> Result<Value> {
        let resp = self
            .http
            .get(self.config.endpoint(USER_INFO_PATH))
            .query(&[("fields", USER_FIELDS)])
            .bearer_auth(token)
            .timeout(SHORT_TIMEOUT)
            .send()
            .await
            .map_err(PostError::transport("whoami"))?;
        let (status, body) = read(resp).await.map_err(PostError::transport("whoami"))?;

        if !status.is_success() {
            return Err(PostError::UserInfo { status: status.as_u16(), body });
        }
        match data_of(&body).and_then(|mut data| data.get_mut("user").map(Value::take)) {
            Some(user) => Ok(user),
            None => Err(PostError::UserInfo { status: status.as_u16(), body }),
        }
    }
}
