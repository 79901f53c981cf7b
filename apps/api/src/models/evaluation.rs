use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A CV's latest evaluation joined with its filename, for ranked results.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RankedResultRow {
    pub cv_id: Uuid,
    pub filename: String,
    pub skill_score: f64,
    pub cultural_score: f64,
    pub overall_score: f64,
    pub skill_assessment: String,
    pub cultural_assessment: String,
    pub summary: String,
    pub recommendation: String,
    pub error_flag: bool,
    pub status: String,
    pub evaluated_at: DateTime<Utc>,
}
