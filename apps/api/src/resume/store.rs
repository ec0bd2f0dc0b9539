//! Resume persistence seam.
//!
//! `AppState` holds an `Arc<dyn ResumeStore>`: `PgResumeStore` in production,
//! `MemoryResumeStore` for local runs and the handler tests. Both honor the
//! same contract:
//!
//! - owner-scoped calls resolve the resume through the caller's subject id,
//!   never through a client-supplied user id;
//! - a replace swaps every child row and the scalar fields in one atomic
//!   step, assigning `sort = index` in the submitted lists;
//! - reads return children in ascending `sort` order and never mix two saves.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::resume::payload::{
    PublicResume, ResumeDocument, ResumePayload, ResumeSummary, SaveReceipt,
};

#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Summaries of the owner's resumes, most recently updated first.
    async fn list_resumes(&self, owner: &Identity) -> Result<Vec<ResumeSummary>, AppError>;

    /// Creates the owner's user row if needed, then the resume and its children.
    async fn create_resume(
        &self,
        owner: &Identity,
        payload: &ResumePayload,
    ) -> Result<SaveReceipt, AppError>;

    /// Full document, or `NotFound` unless the resume belongs to `owner`.
    async fn get_resume(&self, owner: &Identity, id: Uuid) -> Result<ResumeDocument, AppError>;

    /// Record-replace. `NotFound` (and no writes) unless the resume belongs to `owner`.
    async fn replace_resume(
        &self,
        owner: &Identity,
        id: Uuid,
        payload: &ResumePayload,
    ) -> Result<SaveReceipt, AppError>;

    /// Most recently updated public resume of the user holding `handle`.
    async fn get_public_resume(&self, handle: &str) -> Result<PublicResume, AppError>;

    fn backend(&self) -> &'static str;
}

pub(crate) fn resume_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Resume {id} not found"))
}

pub(crate) fn public_not_found(handle: &str) -> AppError {
    AppError::NotFound(format!("No public resume for '{handle}'"))
}

pub(crate) fn handle_taken(handle: &str) -> AppError {
    AppError::Conflict(format!("Username '{handle}' is already taken"))
}

/// Converts a child index into its sort key.
pub(crate) fn sort_key(index: usize) -> Result<i32, AppError> {
    i32::try_from(index)
        .map_err(|_| AppError::Validation(format!("collection index {index} out of range")))
}
