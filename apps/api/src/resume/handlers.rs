//! Axum route handlers for the Resume API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthUser, Identity};
use crate::errors::AppError;
use crate::resume::payload::{
    validate_payload, PublicResume, ResumeDocument, ResumePayload, ResumeSummary, SaveReceipt,
};
use crate::resume::render::render_resume_markdown;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub provider: &'static str,
}

/// Non-UUID ids can never name a resume, so they are simply not found.
fn parse_resume_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Resume {raw} not found")))
}

/// Turns a body that does not deserialize into invalid-input, then runs the
/// required-field checks. Both happen before any store access.
fn accept_payload(
    body: Result<Json<ResumePayload>, JsonRejection>,
) -> Result<ResumePayload, AppError> {
    let Json(payload) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    validate_payload(&payload)?;
    Ok(payload)
}

fn markdown(body: String) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        body,
    )
}

/// GET /api/v1/me
pub async fn handle_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Json<MeResponse> {
    Json(MeResponse {
        identity,
        provider: state.identity.backend(),
    })
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
) -> Result<Json<ResumeListResponse>, AppError> {
    let resumes = state.store.list_resumes(&owner).await?;
    Ok(Json(ResumeListResponse { resumes }))
}

/// POST /api/v1/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    body: Result<Json<ResumePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<SaveReceipt>), AppError> {
    let payload = accept_payload(body)?;
    let receipt = state.store.create_resume(&owner, &payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ResumeDocument>, AppError> {
    let id = parse_resume_id(&id)?;
    Ok(Json(state.store.get_resume(&owner, id).await?))
}

/// PUT /api/v1/resumes/:id
///
/// Record-replace: every child collection is swapped for the submitted one in
/// a single transaction.
pub async fn handle_replace_resume(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
    body: Result<Json<ResumePayload>, JsonRejection>,
) -> Result<Json<SaveReceipt>, AppError> {
    let id = parse_resume_id(&id)?;
    let payload = accept_payload(body)?;
    Ok(Json(state.store.replace_resume(&owner, id, &payload).await?))
}

/// GET /api/v1/resumes/:id/markdown
pub async fn handle_resume_markdown(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_resume_id(&id)?;
    let document = state.store.get_resume(&owner, id).await?;
    Ok(markdown(render_resume_markdown(&document.content)))
}

/// GET /api/v1/public/:username
pub async fn handle_public_resume(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<PublicResume>, AppError> {
    let public = state.store.get_public_resume(&username).await?;
    info!("Served public resume {} for '{username}'", public.resume.id);
    Ok(Json(public))
}

/// GET /api/v1/public/:username/markdown
pub async fn handle_public_markdown(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let public = state.store.get_public_resume(&username).await?;
    Ok(markdown(render_resume_markdown(&public.resume.content)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::mock::MOCK_SUBJECT_HEADER;
    use crate::auth::MockIdentityProvider;
    use crate::auth::{Identity, IdentityProvider};
    use crate::resume::memory::MemoryResumeStore;
    use crate::routes::build_router;

    use super::*;

    /// Identity adapter that never finds credentials.
    struct Anonymous;

    #[async_trait::async_trait]
    impl IdentityProvider for Anonymous {
        async fn authenticate(
            &self,
            _headers: &axum::http::HeaderMap,
        ) -> Result<Option<Identity>, AppError> {
            Ok(None)
        }

        fn backend(&self) -> &'static str {
            "anonymous"
        }
    }

    fn app() -> Router {
        build_router(AppState {
            store: Arc::new(MemoryResumeStore::new()),
            identity: Arc::new(MockIdentityProvider::new(Identity {
                subject_id: "dev-user-123".to_string(),
                email: Some("dev@example.com".to_string()),
                name: Some("Dev User".to_string()),
            })),
        })
    }

    fn ada_body() -> Value {
        json!({
            "personal": {"name": "Ada Lovelace", "email": "ada@example.com", "phone": "555-0100"},
            "experience": [{"title": "Engineer", "company": "Acme", "startDate": "2020-01-01"}],
            "education": [{"degree": "BSc", "school": "Kings", "graduationDate": "2015-06-01"}],
            "skills": ["C++", "Mathematics"]
        })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        subject: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(subject) = subject {
            builder = builder.header(MOCK_SUBJECT_HEADER, subject);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_ada_scenario_round_trip() {
        let app = app();
        let (status, created) =
            send(&app, Method::POST, "/api/v1/resumes", None, Some(ada_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert_eq!(created["isPublic"], false);

        let (status, doc) =
            send(&app, Method::GET, &format!("/api/v1/resumes/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["personal"]["name"], "Ada Lovelace");
        assert_eq!(doc["experience"][0]["title"], "Engineer");
        assert_eq!(doc["experience"][0]["company"], "Acme");
        assert_eq!(doc["experience"][0]["startDate"], "2020-01-01");
        assert_eq!(doc["education"][0]["degree"], "BSc");
        assert_eq!(doc["education"][0]["school"], "Kings");
        assert_eq!(doc["skills"], json!(["C++", "Mathematics"]));

        let mut replacement = ada_body();
        replacement["skills"] = json!(["Mathematics"]);
        let (status, receipt) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/resumes/{id}"),
            None,
            Some(replacement),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["id"], id.as_str());

        let (_, doc) = send(&app, Method::GET, &format!("/api/v1/resumes/{id}"), None, None).await;
        assert_eq!(doc["skills"], json!(["Mathematics"]));
    }

    #[tokio::test]
    async fn test_list_returns_summaries() {
        let app = app();
        send(&app, Method::POST, "/api/v1/resumes", None, Some(ada_body())).await;
        let (status, list) = send(&app, Method::GET, "/api/v1/resumes", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let resumes = list["resumes"].as_array().unwrap();
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0]["name"], "Ada Lovelace");
        assert!(resumes[0].get("skills").is_none());

        let (_, other) = send(&app, Method::GET, "/api/v1/resumes", Some("someone-else"), None).await;
        assert_eq!(other["resumes"], json!([]));
    }

    #[tokio::test]
    async fn test_invalid_payloads_rejected() {
        let app = app();
        let mut blank_name = ada_body();
        blank_name["personal"]["name"] = json!("");
        let (status, body) =
            send(&app, Method::POST, "/api/v1/resumes", None, Some(blank_name)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("personal.name"));

        let mut missing_skills = ada_body();
        missing_skills.as_object_mut().unwrap().remove("skills");
        let (status, _) =
            send(&app, Method::POST, "/api/v1/resumes", None, Some(missing_skills)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nothing reached the store.
        let (_, list) = send(&app, Method::GET, "/api/v1/resumes", None, None).await;
        assert_eq!(list["resumes"], json!([]));
    }

    #[tokio::test]
    async fn test_invalid_replace_leaves_resume_unchanged() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/api/v1/resumes", None, Some(ada_body())).await;
        let uri = format!("/api/v1/resumes/{}", created["id"].as_str().unwrap());
        let (_, before) = send(&app, Method::GET, &uri, None, None).await;

        let mut blank_company = ada_body();
        blank_company["experience"][0]["company"] = json!("  ");
        blank_company["skills"] = json!(["Mathematics"]);
        let (status, body) = send(&app, Method::PUT, &uri, None, Some(blank_company)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("experience[0].company"));

        let (_, after) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(after, before);
        assert_eq!(after["skills"], json!(["C++", "Mathematics"]));
    }

    #[tokio::test]
    async fn test_other_owner_gets_not_found() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/api/v1/resumes", None, Some(ada_body())).await;
        let uri = format!("/api/v1/resumes/{}", created["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::GET, &uri, Some("intruder"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::PUT, &uri, Some("intruder"), Some(ada_body())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/api/v1/resumes/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_public_copy_requires_flag() {
        let app = app();
        let mut body = ada_body();
        body["username"] = json!("ada");
        let (_, created) = send(&app, Method::POST, "/api/v1/resumes", None, Some(body.clone())).await;
        assert_eq!(created["username"], "ada");

        let (status, _) = send(&app, Method::GET, "/api/v1/public/ada", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        body["isPublic"] = json!(true);
        let uri = format!("/api/v1/resumes/{}", created["id"].as_str().unwrap());
        let (status, _) = send(&app, Method::PUT, &uri, None, Some(body)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, public) = send(&app, Method::GET, "/api/v1/public/ada", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(public["username"], "ada");
        assert_eq!(public["resume"]["skills"], json!(["C++", "Mathematics"]));
        assert!(public["resume"].get("isPublic").is_none());

        let (status, md) = send(&app, Method::GET, "/api/v1/public/ada/markdown", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(md.as_str().unwrap().starts_with("# Ada Lovelace"));
    }

    #[tokio::test]
    async fn test_taken_handle_is_conflict() {
        let app = app();
        let mut body = ada_body();
        body["username"] = json!("ada");
        send(&app, Method::POST, "/api/v1/resumes", None, Some(body.clone())).await;

        let (status, err) =
            send(&app, Method::POST, "/api/v1/resumes", Some("babbage"), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"]["code"], "CONFLICT");
        let (_, list) = send(&app, Method::GET, "/api/v1/resumes", Some("babbage"), None).await;
        assert_eq!(list["resumes"], json!([]));
    }

    #[tokio::test]
    async fn test_owner_markdown_export() {
        let app = app();
        let (_, created) = send(&app, Method::POST, "/api/v1/resumes", None, Some(ada_body())).await;
        let uri = format!("/api/v1/resumes/{}/markdown", created["id"].as_str().unwrap());
        let (status, md) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(md.as_str().unwrap().contains("## Skills\n\nC++, Mathematics"));

        let (status, _) = send(&app, Method::GET, &uri, Some("intruder"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_me_reports_identity() {
        let app = app();
        let (status, me) = send(&app, Method::GET, "/api/v1/me", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["subjectId"], "dev-user-123");
        assert_eq!(me["email"], "dev@example.com");
        assert_eq!(me["provider"], "mock");
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_rejected() {
        let app = build_router(AppState {
            store: Arc::new(MemoryResumeStore::new()),
            identity: Arc::new(Anonymous),
        });
        for (method, uri, body) in [
            (Method::GET, "/api/v1/resumes", None),
            (Method::POST, "/api/v1/resumes", Some(ada_body())),
            (Method::GET, "/api/v1/me", None),
        ] {
            let (status, err) = send(&app, method, uri, None, body).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(err["error"]["code"], "UNAUTHORIZED");
        }

        let (status, _) = send(&app, Method::GET, "/api/v1/public/ada", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
