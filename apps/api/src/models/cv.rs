use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub text: String,
    pub filename: String,
    pub s3_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
