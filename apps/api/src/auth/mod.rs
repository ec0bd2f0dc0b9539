//! Identity resolution.
//!
//! Every owner-scoped request resolves its caller through one
//! `IdentityProvider`, chosen at startup from `AUTH_PROVIDER`. Adapters bind
//! to an external service's documented contract and hold no session state.

pub mod introspection;
pub mod mock;
pub mod userinfo;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Serialize;

use crate::config::AuthConfig;
use crate::errors::AppError;
use crate::state::AppState;

pub use introspection::TokenIntrospectionProvider;
pub use mock::MockIdentityProvider;
pub use userinfo::UserInfoProvider;

/// The caller as reported by the identity adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Identity {
            subject_id: subject_id.into(),
            email: None,
            name: None,
        }
    }
}

/// Resolves the identity behind one incoming request.
///
/// `Ok(None)` means the request carries no usable credentials; `Err` is
/// reserved for the provider itself failing.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AppError>;

    /// Short backend name, reported by `/health` and `/api/v1/me`.
    fn backend(&self) -> &'static str;
}

/// Builds the adapter selected by configuration.
pub fn build_identity_provider(
    config: &AuthConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    let provider: Arc<dyn IdentityProvider> = match config {
        AuthConfig::Mock {
            subject,
            email,
            name,
        } => Arc::new(MockIdentityProvider::new(Identity {
            subject_id: subject.clone(),
            email: email.clone(),
            name: name.clone(),
        })),
        AuthConfig::OAuth { userinfo_url } => {
            Arc::new(UserInfoProvider::new(userinfo_url.clone(), timeout)?)
        }
        AuthConfig::Token {
            introspection_url,
            client_id,
            client_secret,
        } => Arc::new(TokenIntrospectionProvider::new(
            introspection_url.clone(),
            client_id.clone(),
            client_secret.clone(),
            timeout,
        )?),
    };
    Ok(provider)
}

/// Extracts `<token>` from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authenticated caller, resolved per request through `AppState::identity`.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.identity.authenticate(&parts.headers).await? {
            Some(identity) => Ok(AuthUser(identity)),
            None => {
                tracing::debug!("Rejecting unauthenticated request to {}", parts.uri.path());
                Err(AppError::Unauthorized)
            }
        }
    }
}
