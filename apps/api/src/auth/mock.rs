use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::auth::{Identity, IdentityProvider};
use crate::errors::AppError;

/// Header that lets a local client act as a different subject.
pub const MOCK_SUBJECT_HEADER: &str = "x-mock-subject";

/// Development adapter: every request is the configured identity unless it
/// names another subject through `x-mock-subject`.
pub struct MockIdentityProvider {
    default_identity: Identity,
}

impl MockIdentityProvider {
    pub fn new(default_identity: Identity) -> Self {
        Self { default_identity }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AppError> {
        let requested = headers
            .get(MOCK_SUBJECT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        Ok(Some(match requested {
            Some(subject) if subject != self.default_identity.subject_id => Identity {
                subject_id: subject.to_string(),
                email: None,
                name: None,
            },
            _ => self.default_identity.clone(),
        }))
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}
