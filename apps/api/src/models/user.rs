use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    /// Opaque identifier issued by whichever identity adapter is active.
    pub subject_id: String,
    pub email: Option<String>,
    /// Public handle; unique across users when set.
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}
