use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::resume::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Resume persistence. Postgres in production, memory when `STORE_BACKEND=memory`.
    pub store: Arc<dyn ResumeStore>,
    /// Identity adapter selected by `AUTH_PROVIDER`; consulted once per request.
    pub identity: Arc<dyn IdentityProvider>,
}
