use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobDescriptionRow {
    pub id: Uuid,
    pub text: String,
    pub filename: String,
    pub s3_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Job listing entry with upload and evaluation counts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobSummaryRow {
    pub id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub cv_count: i64,
    pub evaluated_count: i64,
}
