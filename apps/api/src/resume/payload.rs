//! Wire types for the resume API and the required-field validation that runs
//! before any store access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{EducationRow, ExperienceRow, ResumeRow, SkillRow};

/// Upper bound on items per child collection.
pub const MAX_COLLECTION_ITEMS: usize = 100;
/// Upper bound on handle length, in characters.
pub const MAX_HANDLE_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceItem {
    pub title: String,
    pub company: String,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationItem {
    pub degree: String,
    pub school: String,
    pub graduation_date: String,
}

/// The editable body of a resume: personal block, summary and the three
/// ordered child collections. Collections are required but may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeContent {
    pub personal: PersonalInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub experience: Vec<ExperienceItem>,
    pub education: Vec<EducationItem>,
    pub skills: Vec<String>,
}

/// Request body for create and replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    #[serde(flatten)]
    pub content: ResumeContent,
    /// Omitted on replace means "keep the stored flag".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    /// Omitted leaves the owner's handle alone; blank clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// What a handle-carrying save should do to the owner's handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleChange {
    Keep,
    Clear,
    Set(String),
}

impl ResumePayload {
    pub fn handle_change(&self) -> HandleChange {
        match self.username.as_deref().map(str::trim) {
            None => HandleChange::Keep,
            Some("") => HandleChange::Clear,
            Some(handle) => HandleChange::Set(handle.to_string()),
        }
    }

    /// Returns a copy with blank optional strings collapsed to `None`.
    pub fn normalized(&self) -> ResumePayload {
        let mut payload = self.clone();
        let content = &mut payload.content;
        content.personal.address = non_blank(content.personal.address.take());
        content.summary = non_blank(content.summary.take());
        for item in &mut content.experience {
            item.end_date = non_blank(item.end_date.take());
            item.description = non_blank(item.description.take());
        }
        payload
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Response for create and replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub id: Uuid,
    pub is_public: bool,
    pub username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Entry in the owner's resume list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub id: Uuid,
    pub name: String,
    pub summary: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ResumeRow> for ResumeSummary {
    fn from(row: &ResumeRow) -> Self {
        ResumeSummary {
            id: row.id,
            name: row.name.clone(),
            summary: row.summary.clone(),
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Full owner-scoped view of one resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDocument {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: ResumeContent,
    pub is_public: bool,
    pub username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeDocument {
    /// Assembles a document from stored rows. Child rows must already be in
    /// ascending sort order.
    pub fn from_rows(
        resume: ResumeRow,
        username: Option<String>,
        experiences: Vec<ExperienceRow>,
        educations: Vec<EducationRow>,
        skills: Vec<SkillRow>,
    ) -> Self {
        ResumeDocument {
            id: resume.id,
            content: ResumeContent {
                personal: PersonalInfo {
                    name: resume.name,
                    email: resume.email,
                    phone: resume.phone,
                    address: resume.address,
                },
                summary: resume.summary,
                experience: experiences
                    .into_iter()
                    .map(|e| ExperienceItem {
                        title: e.title,
                        company: e.company,
                        start_date: e.start_date,
                        end_date: e.end_date,
                        description: e.description,
                    })
                    .collect(),
                education: educations
                    .into_iter()
                    .map(|e| EducationItem {
                        degree: e.degree,
                        school: e.school,
                        graduation_date: e.graduation_date,
                    })
                    .collect(),
                skills: skills.into_iter().map(|s| s.name).collect(),
            },
            is_public: resume.is_public,
            username,
            updated_at: resume.updated_at,
        }
    }
}

/// Read-only copy served at the handle address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicResume {
    pub username: String,
    pub resume: PublicResumeBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicResumeBody {
    pub id: Uuid,
    #[serde(flatten)]
    pub content: ResumeContent,
    pub updated_at: DateTime<Utc>,
}

impl PublicResume {
    pub fn from_document(username: String, document: ResumeDocument) -> Self {
        PublicResume {
            username,
            resume: PublicResumeBody {
                id: document.id,
                content: document.content,
                updated_at: document.updated_at,
            },
        }
    }
}

/// A single failed required-field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: &'static str,
}

/// Collects every required-field failure in the payload.
pub fn collect_issues(payload: &ResumePayload) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let mut require = |field: String, value: &str| {
        if value.trim().is_empty() {
            issues.push(FieldIssue {
                field,
                message: "is required",
            });
        }
    };

    let content = &payload.content;
    require("personal.name".to_string(), &content.personal.name);
    require("personal.email".to_string(), &content.personal.email);
    require("personal.phone".to_string(), &content.personal.phone);

    for (i, exp) in content.experience.iter().enumerate() {
        require(format!("experience[{i}].title"), &exp.title);
        require(format!("experience[{i}].company"), &exp.company);
        require(format!("experience[{i}].startDate"), &exp.start_date);
    }
    for (i, edu) in content.education.iter().enumerate() {
        require(format!("education[{i}].degree"), &edu.degree);
        require(format!("education[{i}].school"), &edu.school);
        require(format!("education[{i}].graduationDate"), &edu.graduation_date);
    }

    for (field, len) in [
        ("experience", content.experience.len()),
        ("education", content.education.len()),
        ("skills", content.skills.len()),
    ] {
        if len > MAX_COLLECTION_ITEMS {
            issues.push(FieldIssue {
                field: field.to_string(),
                message: "has too many items",
            });
        }
    }

    if let HandleChange::Set(handle) = payload.handle_change() {
        if !is_valid_handle(&handle) {
            issues.push(FieldIssue {
                field: "username".to_string(),
                message: "must be 1-40 letters, digits, '-' or '_'",
            });
        }
    }

    issues
}

/// Rejects the payload with `AppError::Validation` listing every failing field.
pub fn validate_payload(payload: &ResumePayload) -> Result<(), AppError> {
    let issues = collect_issues(payload);
    if issues.is_empty() {
        return Ok(());
    }
    let message = issues
        .iter()
        .map(|i| format!("{} {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::Validation(message))
}

pub fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.chars().count() <= MAX_HANDLE_LEN
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// The Ada Lovelace resume used across the store and handler tests.
    pub fn ada() -> ResumePayload {
        ResumePayload {
            content: ResumeContent {
                personal: PersonalInfo {
                    name: "Ada Lovelace".to_string(),
                    email: "ada@example.com".to_string(),
                    phone: "555-0100".to_string(),
                    address: None,
                },
                summary: None,
                experience: vec![ExperienceItem {
                    title: "Engineer".to_string(),
                    company: "Acme".to_string(),
                    start_date: "2020-01-01".to_string(),
                    end_date: None,
                    description: None,
                }],
                education: vec![EducationItem {
                    degree: "BSc".to_string(),
                    school: "Kings".to_string(),
                    graduation_date: "2015-06-01".to_string(),
                }],
                skills: vec!["C++".to_string(), "Mathematics".to_string()],
            },
            is_public: None,
            username: None,
        }
    }

    pub fn with_skills(mut payload: ResumePayload, skills: &[&str]) -> ResumePayload {
        payload.content.skills = skills.iter().map(|s| s.to_string()).collect();
        payload
    }
}
