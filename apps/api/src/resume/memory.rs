use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::models::user::UserRow;
use crate::resume::payload::{
    HandleChange, PublicResume, ResumeContent, ResumeDocument, ResumePayload, ResumeSummary,
    SaveReceipt,
};
use crate::resume::store::{handle_taken, public_not_found, resume_not_found, ResumeStore};

struct StoredResume {
    row: ResumeRow,
    content: ResumeContent,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, UserRow>,
    resumes: HashMap<Uuid, StoredResume>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing timestamps so "most recently updated" is total.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(next);
        next
    }

    fn user_by_subject(&self, subject_id: &str) -> Option<&UserRow> {
        self.users.values().find(|u| u.subject_id == subject_id)
    }

    fn owned_resume(&self, owner: &Identity, id: Uuid) -> Option<(&StoredResume, &UserRow)> {
        let stored = self.resumes.get(&id)?;
        let user = self.users.get(&stored.row.user_id)?;
        (user.subject_id == owner.subject_id).then_some((stored, user))
    }

    /// Fails before any mutation when the handle belongs to someone else.
    fn check_handle(&self, owner: &Identity, change: &HandleChange) -> Result<(), AppError> {
        if let HandleChange::Set(handle) = change {
            let taken = self.users.values().any(|u| {
                u.username.as_deref() == Some(handle.as_str()) && u.subject_id != owner.subject_id
            });
            if taken {
                return Err(handle_taken(handle));
            }
        }
        Ok(())
    }

    fn upsert_user(&mut self, owner: &Identity) -> Uuid {
        if let Some(user) = self
            .users
            .values_mut()
            .find(|u| u.subject_id == owner.subject_id)
        {
            if owner.email.is_some() {
                user.email = owner.email.clone();
            }
            return user.id;
        }
        let created_at = self.stamp();
        let id = Uuid::new_v4();
        self.users.insert(
            id,
            UserRow {
                id,
                subject_id: owner.subject_id.clone(),
                email: owner.email.clone(),
                username: None,
                created_at,
            },
        );
        id
    }

    fn apply_handle(&mut self, user_id: Uuid, change: HandleChange) -> Option<String> {
        let user = self.users.get_mut(&user_id)?;
        match change {
            HandleChange::Keep => {}
            HandleChange::Clear => user.username = None,
            HandleChange::Set(handle) => user.username = Some(handle),
        }
        user.username.clone()
    }

    fn document(stored: &StoredResume, user: &UserRow) -> ResumeDocument {
        ResumeDocument {
            id: stored.row.id,
            content: stored.content.clone(),
            is_public: stored.row.is_public,
            username: user.username.clone(),
            updated_at: stored.row.updated_at,
        }
    }
}

/// Process-local store with the same contract as `PgResumeStore`.
/// Every operation runs under one lock, which makes each save atomic.
#[derive(Default)]
pub struct MemoryResumeStore {
    state: RwLock<MemoryState>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn list_resumes(&self, owner: &Identity) -> Result<Vec<ResumeSummary>, AppError> {
        let state = self.state.read().await;
        let Some(user) = state.user_by_subject(&owner.subject_id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<&ResumeRow> = state
            .resumes
            .values()
            .map(|r| &r.row)
            .filter(|r| r.user_id == user.id)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows.into_iter().map(ResumeSummary::from).collect())
    }

    async fn create_resume(
        &self,
        owner: &Identity,
        payload: &ResumePayload,
    ) -> Result<SaveReceipt, AppError> {
        let payload = payload.normalized();
        let change = payload.handle_change();

        let mut state = self.state.write().await;
        state.check_handle(owner, &change)?;

        let user_id = state.upsert_user(owner);
        let username = state.apply_handle(user_id, change);
        let now = state.stamp();
        let id = Uuid::new_v4();
        let personal = &payload.content.personal;
        let row = ResumeRow {
            id,
            user_id,
            name: personal.name.clone(),
            email: personal.email.clone(),
            phone: personal.phone.clone(),
            address: personal.address.clone(),
            summary: payload.content.summary.clone(),
            is_public: payload.is_public.unwrap_or(false),
            created_at: now,
            updated_at: now,
        };
        let receipt = SaveReceipt {
            id,
            is_public: row.is_public,
            username,
            updated_at: now,
        };
        state.resumes.insert(
            id,
            StoredResume {
                row,
                content: payload.content,
            },
        );

        info!("Created resume {id} for subject {}", owner.subject_id);
        Ok(receipt)
    }

    async fn get_resume(&self, owner: &Identity, id: Uuid) -> Result<ResumeDocument, AppError> {
        let state = self.state.read().await;
        let (stored, user) = state
            .owned_resume(owner, id)
            .ok_or_else(|| resume_not_found(id))?;
        Ok(MemoryState::document(stored, user))
    }

    async fn replace_resume(
        &self,
        owner: &Identity,
        id: Uuid,
        payload: &ResumePayload,
    ) -> Result<SaveReceipt, AppError> {
        let payload = payload.normalized();
        let change = payload.handle_change();

        let mut state = self.state.write().await;
        let (user_id, was_public) = state
            .owned_resume(owner, id)
            .map(|(stored, user)| (user.id, stored.row.is_public))
            .ok_or_else(|| resume_not_found(id))?;
        state.check_handle(owner, &change)?;

        let username = state.apply_handle(user_id, change);
        let now = state.stamp();
        let is_public = payload.is_public.unwrap_or(was_public);
        let stored = state
            .resumes
            .get_mut(&id)
            .ok_or_else(|| resume_not_found(id))?;
        let personal = &payload.content.personal;
        stored.row.name = personal.name.clone();
        stored.row.email = personal.email.clone();
        stored.row.phone = personal.phone.clone();
        stored.row.address = personal.address.clone();
        stored.row.summary = payload.content.summary.clone();
        stored.row.is_public = is_public;
        stored.row.updated_at = now;
        stored.content = payload.content;

        info!("Replaced resume {id} for subject {}", owner.subject_id);
        Ok(SaveReceipt {
            id,
            is_public,
            username,
            updated_at: now,
        })
    }

    async fn get_public_resume(&self, handle: &str) -> Result<PublicResume, AppError> {
        let state = self.state.read().await;
        let user = state
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(handle))
            .ok_or_else(|| public_not_found(handle))?;
        let stored = state
            .resumes
            .values()
            .filter(|r| r.row.user_id == user.id && r.row.is_public)
            .max_by_key(|r| r.row.updated_at)
            .ok_or_else(|| public_not_found(handle))?;
        Ok(PublicResume::from_document(
            handle.to_string(),
            MemoryState::document(stored, user),
        ))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
