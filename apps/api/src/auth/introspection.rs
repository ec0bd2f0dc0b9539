//! Self-hosted credential/token service adapter.
//!
//! Tokens are checked with an RFC 7662 introspection call. Inactive tokens
//! are treated as absent credentials.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::auth::userinfo::non_empty_subject;
use crate::auth::{bearer_token, Identity, IdentityProvider};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

impl IntrospectionResponse {
    fn into_identity(self) -> Option<Identity> {
        if !self.active {
            return None;
        }
        non_empty_subject(Identity {
            subject_id: self.sub?,
            email: self.email,
            name: self.name,
        })
    }
}

pub struct TokenIntrospectionProvider {
    client: Client,
    introspection_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl TokenIntrospectionProvider {
    pub fn new(
        introspection_url: String,
        client_id: Option<String>,
        client_secret: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            introspection_url,
            client_id,
            client_secret,
        })
    }
}

#[async_trait]
impl IdentityProvider for TokenIntrospectionProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AppError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let mut request = self
            .client
            .post(&self.introspection_url)
            .form(&[("token", token), ("token_type_hint", "access_token")]);
        if let Some(client_id) = &self.client_id {
            request = request.basic_auth(client_id, self.client_secret.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            AppError::IdentityProvider(format!("introspection request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("introspection endpoint answered {status}");
            return Err(AppError::IdentityProvider(format!(
                "introspection endpoint answered {status}"
            )));
        }

        let body: IntrospectionResponse = response.json().await.map_err(|e| {
            AppError::IdentityProvider(format!("malformed introspection body: {e}"))
        })?;
        Ok(body.into_identity())
    }

    fn backend(&self) -> &'static str {
        "token"
    }
}
