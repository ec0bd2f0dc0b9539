pub mod health;

use axum::{routing::get, Router};

use crate::resume::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/me", get(handlers::handle_me))
        // Owner-scoped resume API
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list_resumes).post(handlers::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(handlers::handle_get_resume).put(handlers::handle_replace_resume),
        )
        .route(
            "/api/v1/resumes/:id/markdown",
            get(handlers::handle_resume_markdown),
        )
        // Public read-only copies, addressed by handle
        .route("/api/v1/public/:username", get(handlers::handle_public_resume))
        .route(
            "/api/v1/public/:username/markdown",
            get(handlers::handle_public_markdown),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{Identity, MockIdentityProvider};
    use crate::resume::MemoryResumeStore;

    #[tokio::test]
    async fn test_health_reports_backends() {
        let app = build_router(AppState {
            store: Arc::new(MemoryResumeStore::new()),
            identity: Arc::new(MockIdentityProvider::new(Identity::new("dev"))),
        });
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["identity"], "mock");
    }
}
