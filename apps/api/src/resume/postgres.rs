use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::resume::{EducationRow, ExperienceRow, ResumeRow, SkillRow};
use crate::resume::payload::{
    HandleChange, PublicResume, ResumeContent, ResumeDocument, ResumePayload, ResumeSummary,
    SaveReceipt,
};
use crate::resume::store::{
    handle_taken, public_not_found, resume_not_found, sort_key, ResumeStore,
};

/// PostgreSQL-backed store. Every save is one transaction; reads run in a
/// read-only repeatable-read transaction so a document never mixes two saves.
#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OwnedResume {
    user_id: Uuid,
    is_public: bool,
}

/// Upserts the caller's user row, keyed on the subject id.
async fn upsert_user(conn: &mut PgConnection, owner: &Identity) -> Result<Uuid, AppError> {
    Ok(sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO users (id, subject_id, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (subject_id)
        DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&owner.subject_id)
    .bind(&owner.email)
    .fetch_one(conn)
    .await?)
}

/// Applies a handle change and returns the resulting handle.
/// A handle held by another user maps to `Conflict`.
async fn apply_handle(
    conn: &mut PgConnection,
    user_id: Uuid,
    change: &HandleChange,
) -> Result<Option<String>, AppError> {
    let value = match change {
        HandleChange::Keep => {
            return Ok(sqlx::query_scalar::<_, Option<String>>(
                "SELECT username FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_one(conn)
            .await?);
        }
        HandleChange::Clear => None,
        HandleChange::Set(handle) => Some(handle.as_str()),
    };

    let result = sqlx::query_scalar::<_, Option<String>>(
        "UPDATE users SET username = $1 WHERE id = $2 RETURNING username",
    )
    .bind(value)
    .bind(user_id)
    .fetch_one(conn)
    .await;

    match result {
        Ok(username) => Ok(username),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(handle_taken(value.unwrap_or_default()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Inserts every child row with `sort` equal to its position in the payload.
async fn insert_children(
    conn: &mut PgConnection,
    resume_id: Uuid,
    content: &ResumeContent,
) -> Result<(), AppError> {
    for (idx, exp) in content.experience.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO resume_experiences
                (id, resume_id, sort, title, company, start_date, end_date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(sort_key(idx)?)
        .bind(&exp.title)
        .bind(&exp.company)
        .bind(&exp.start_date)
        .bind(&exp.end_date)
        .bind(&exp.description)
        .execute(&mut *conn)
        .await?;
    }

    for (idx, edu) in content.education.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO resume_educations (id, resume_id, sort, degree, school, graduation_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(sort_key(idx)?)
        .bind(&edu.degree)
        .bind(&edu.school)
        .bind(&edu.graduation_date)
        .execute(&mut *conn)
        .await?;
    }

    for (idx, skill) in content.skills.iter().enumerate() {
        sqlx::query("INSERT INTO resume_skills (id, resume_id, sort, name) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(resume_id)
            .bind(sort_key(idx)?)
            .bind(skill)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn delete_children(conn: &mut PgConnection, resume_id: Uuid) -> Result<(), AppError> {
    for table in ["resume_experiences", "resume_educations", "resume_skills"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE resume_id = $1"))
            .bind(resume_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Loads a resume's children in sort order and assembles the document.
async fn load_document(
    conn: &mut PgConnection,
    resume: ResumeRow,
    username: Option<String>,
) -> Result<ResumeDocument, AppError> {
    let experiences = sqlx::query_as::<_, ExperienceRow>(
        "SELECT * FROM resume_experiences WHERE resume_id = $1 ORDER BY sort ASC",
    )
    .bind(resume.id)
    .fetch_all(&mut *conn)
    .await?;

    let educations = sqlx::query_as::<_, EducationRow>(
        "SELECT * FROM resume_educations WHERE resume_id = $1 ORDER BY sort ASC",
    )
    .bind(resume.id)
    .fetch_all(&mut *conn)
    .await?;

    let skills = sqlx::query_as::<_, SkillRow>(
        "SELECT * FROM resume_skills WHERE resume_id = $1 ORDER BY sort ASC",
    )
    .bind(resume.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ResumeDocument::from_rows(
        resume,
        username,
        experiences,
        educations,
        skills,
    ))
}

async fn begin_snapshot_read(conn: &mut PgConnection) -> Result<(), AppError> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn list_resumes(&self, owner: &Identity) -> Result<Vec<ResumeSummary>, AppError> {
        let rows = sqlx::query_as::<_, ResumeRow>(
            r#"
            SELECT r.*
            FROM resumes r
            JOIN users u ON u.id = r.user_id
            WHERE u.subject_id = $1
            ORDER BY r.updated_at DESC
            "#,
        )
        .bind(&owner.subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(ResumeSummary::from).collect())
    }

    async fn create_resume(
        &self,
        owner: &Identity,
        payload: &ResumePayload,
    ) -> Result<SaveReceipt, AppError> {
        let payload = payload.normalized();
        let content = &payload.content;
        let mut tx = self.pool.begin().await?;

        let user_id = upsert_user(&mut tx, owner).await?;
        let username = apply_handle(&mut tx, user_id, &payload.handle_change()).await?;

        let resume = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes (id, user_id, name, email, phone, address, summary, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&content.personal.name)
        .bind(&content.personal.email)
        .bind(&content.personal.phone)
        .bind(&content.personal.address)
        .bind(&content.summary)
        .bind(payload.is_public.unwrap_or(false))
        .fetch_one(&mut *tx)
        .await?;

        insert_children(&mut tx, resume.id, content).await?;
        tx.commit().await?;

        info!(
            "Created resume {} for subject {} ({} experience, {} education, {} skills)",
            resume.id,
            owner.subject_id,
            content.experience.len(),
            content.education.len(),
            content.skills.len()
        );

        Ok(SaveReceipt {
            id: resume.id,
            is_public: resume.is_public,
            username,
            updated_at: resume.updated_at,
        })
    }

    async fn get_resume(&self, owner: &Identity, id: Uuid) -> Result<ResumeDocument, AppError> {
        let mut tx = self.pool.begin().await?;
        begin_snapshot_read(&mut tx).await?;

        let resume = sqlx::query_as::<_, ResumeRow>(
            r#"
            SELECT r.*
            FROM resumes r
            JOIN users u ON u.id = r.user_id
            WHERE r.id = $1 AND u.subject_id = $2
            "#,
        )
        .bind(id)
        .bind(&owner.subject_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| resume_not_found(id))?;

        let username: Option<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
                .bind(resume.user_id)
                .fetch_one(&mut *tx)
                .await?;

        let document = load_document(&mut tx, resume, username).await?;
        tx.commit().await?;
        Ok(document)
    }

    async fn replace_resume(
        &self,
        owner: &Identity,
        id: Uuid,
        payload: &ResumePayload,
    ) -> Result<SaveReceipt, AppError> {
        let payload = payload.normalized();
        let content = &payload.content;
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent saves of one resume commit one after the other.
        let existing = sqlx::query_as::<_, OwnedResume>(
            r#"
            SELECT r.user_id, r.is_public
            FROM resumes r
            JOIN users u ON u.id = r.user_id
            WHERE r.id = $1 AND u.subject_id = $2
            FOR UPDATE OF r
            "#,
        )
        .bind(id)
        .bind(&owner.subject_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| resume_not_found(id))?;

        let username = apply_handle(&mut tx, existing.user_id, &payload.handle_change()).await?;

        delete_children(&mut tx, id).await?;
        insert_children(&mut tx, id, content).await?;

        let resume = sqlx::query_as::<_, ResumeRow>(
            r#"
            UPDATE resumes
            SET name = $2, email = $3, phone = $4, address = $5, summary = $6,
                is_public = $7, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&content.personal.name)
        .bind(&content.personal.email)
        .bind(&content.personal.phone)
        .bind(&content.personal.address)
        .bind(&content.summary)
        .bind(payload.is_public.unwrap_or(existing.is_public))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Replaced resume {id} for subject {} ({} experience, {} education, {} skills)",
            owner.subject_id,
            content.experience.len(),
            content.education.len(),
            content.skills.len()
        );

        Ok(SaveReceipt {
            id,
            is_public: resume.is_public,
            username,
            updated_at: resume.updated_at,
        })
    }

    async fn get_public_resume(&self, handle: &str) -> Result<PublicResume, AppError> {
        let mut tx = self.pool.begin().await?;
        begin_snapshot_read(&mut tx).await?;

        let resume = sqlx::query_as::<_, ResumeRow>(
            r#"
            SELECT r.*
            FROM resumes r
            JOIN users u ON u.id = r.user_id
            WHERE u.username = $1 AND r.is_public
            ORDER BY r.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(handle)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| public_not_found(handle))?;

        let document = load_document(&mut tx, resume, Some(handle.to_string())).await?;
        tx.commit().await?;
        Ok(PublicResume::from_document(handle.to_string(), document))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
