//! Hosted OAuth identity service adapter.
//!
//! The bearer token issued by the hosted service is forwarded to its OIDC
//! `userinfo` endpoint; the answer's `sub` becomes the subject id.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{bearer_token, Identity, IdentityProvider};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

impl From<UserInfo> for Identity {
    fn from(info: UserInfo) -> Self {
        Identity {
            subject_id: info.sub,
            email: info.email,
            name: info.name,
        }
    }
}

pub struct UserInfoProvider {
    client: Client,
    userinfo_url: String,
}

impl UserInfoProvider {
    pub fn new(userinfo_url: String, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            userinfo_url,
        })
    }
}

#[async_trait]
impl IdentityProvider for UserInfoProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AppError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("userinfo rejected bearer token ({status})");
            return Ok(None);
        }
        if !status.is_success() {
            warn!("userinfo endpoint answered {status}");
            return Err(AppError::IdentityProvider(format!(
                "userinfo endpoint answered {status}"
            )));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("malformed userinfo body: {e}")))?;
        Ok(non_empty_subject(info.into()))
    }

    fn backend(&self) -> &'static str {
        "oauth"
    }
}

pub(crate) fn non_empty_subject(identity: Identity) -> Option<Identity> {
    (!identity.subject_id.trim().is_empty()).then_some(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_userinfo_maps_to_identity() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "google-oauth2|1234",
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "email_verified": true
        }))
        .unwrap();
        let identity = non_empty_subject(info.into()).unwrap();
        assert_eq!(identity.subject_id, "google-oauth2|1234");
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_blank_subject_is_unauthenticated() {
        assert!(non_empty_subject(Identity::new("  ")).is_none());
    }

    #[tokio::test]
    async fn test_missing_token_skips_network() {
        // Unroutable URL: any outbound call would surface as an error.
        let provider =
            UserInfoProvider::new("http://127.0.0.1:9/userinfo".to_string(), Duration::from_millis(50))
                .unwrap();
        assert_eq!(provider.authenticate(&HeaderMap::new()).await.unwrap(), None);
    }
}
