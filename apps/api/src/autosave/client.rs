//! `ResumeWriter` backed by the folio HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use uuid::Uuid;

use crate::autosave::{ResumeWriter, WriteError};
use crate::resume::payload::{ResumeDocument, ResumePayload, ResumeSummary, SaveReceipt};

#[derive(Debug, Deserialize)]
struct ResumeList {
    resumes: Vec<ResumeSummary>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Loads through `GET /api/v1/resumes[/{id}]`, saves through
/// `POST /api/v1/resumes` and `PUT /api/v1/resumes/{id}`.
#[derive(Clone)]
pub struct HttpResumeWriter {
    client: Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpResumeWriter {
    pub fn new(base_url: &str, bearer: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, WriteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(WriteError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[async_trait]
impl ResumeWriter for HttpResumeWriter {
    async fn load_latest(&self) -> Result<Option<ResumeDocument>, WriteError> {
        let url = format!("{}/api/v1/resumes", self.base_url);
        debug!("GET {url}");
        let response = self.authorized(self.client.get(&url)).send().await?;
        let list: ResumeList = Self::parse(response).await?;

        // The list is ordered most recently updated first.
        let Some(latest) = list.resumes.first() else {
            return Ok(None);
        };
        let url = format!("{}/api/v1/resumes/{}", self.base_url, latest.id);
        debug!("GET {url}");
        let response = self.authorized(self.client.get(&url)).send().await?;
        Ok(Some(Self::parse(response).await?))
    }

    async fn create(&self, payload: &ResumePayload) -> Result<SaveReceipt, WriteError> {
        let url = format!("{}/api/v1/resumes", self.base_url);
        debug!("POST {url}");
        let response = self
            .authorized(self.client.post(&url))
            .json(payload)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn replace(&self, id: Uuid, payload: &ResumePayload) -> Result<SaveReceipt, WriteError> {
        let url = format!("{}/api/v1/resumes/{id}", self.base_url);
        debug!("PUT {url}");
        let response = self
            .authorized(self.client.put(&url))
            .json(payload)
            .send()
            .await?;
        Self::parse(response).await
    }
}

/// Pulls `error.message` out of an API error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
