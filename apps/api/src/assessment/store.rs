//! Persistence for jobs, CVs and evaluations, plus S3 archival of uploaded PDFs.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::assessment::service::EvaluationOutcome;
use crate::models::cv::CvRow;
use crate::models::evaluation::RankedResultRow;
use crate::models::job::{JobDescriptionRow, JobSummaryRow};

// ────────────────────────────────────────────────────────────────────────────
// Object storage
// ────────────────────────────────────────────────────────────────────────────

pub fn job_object_key(job_id: Uuid, filename: &str) -> String {
    format!("jobs/{job_id}/{}", safe_filename(filename))
}

pub fn cv_object_key(job_id: Uuid, cv_id: Uuid) -> String {
    format!("cvs/{job_id}/{cv_id}.pdf")
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
fn safe_filename(filename: &str) -> String {
    let name: String = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.trim_matches('.').is_empty() {
        "upload.pdf".to_string()
    } else {
        name
    }
}

pub async fn archive_pdf(
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    key: &str,
    data: Bytes,
) -> Result<()> {
    s3.put_object()
        .bucket(s3_bucket)
        .key(key)
        .body(ByteStream::from(data))
        .content_type("application/pdf")
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

    info!("Archived PDF to s3://{}/{}", s3_bucket, key);
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

pub async fn store_job(
    pool: &PgPool,
    job_id: Uuid,
    text: &str,
    filename: &str,
    s3_key: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO job_descriptions (id, text, filename, s3_key) VALUES ($1, $2, $3, $4)",
    )
    .bind(job_id)
    .bind(text)
    .bind(filename)
    .bind(s3_key)
    .execute(pool)
    .await?;

    info!("Stored job description {job_id} ({filename})");
    Ok(())
}

pub async fn job_exists(pool: &PgPool, job_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM job_descriptions WHERE id = $1)")
        .bind(job_id)
        .fetch_one(pool)
        .await
}

pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<JobDescriptionRow>, sqlx::Error> {
    sqlx::query_as::<_, JobDescriptionRow>("SELECT * FROM job_descriptions WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await
}

/// Newest first, with the number of uploaded and evaluated CVs.
pub async fn list_jobs(pool: &PgPool) -> Result<Vec<JobSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, JobSummaryRow>(
        r#"
        SELECT
            j.id, j.filename, j.created_at,
            COUNT(DISTINCT c.id)    AS cv_count,
            COUNT(DISTINCT e.cv_id) AS evaluated_count
        FROM job_descriptions j
        LEFT JOIN cvs c ON c.job_id = j.id
        LEFT JOIN evaluations e ON e.cv_id = c.id
        GROUP BY j.id, j.filename, j.created_at
        ORDER BY j.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

// ────────────────────────────────────────────────────────────────────────────
// CVs
// ────────────────────────────────────────────────────────────────────────────

pub async fn store_cv(
    pool: &PgPool,
    cv_id: Uuid,
    job_id: Uuid,
    text: &str,
    filename: &str,
    s3_key: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cvs (id, job_id, text, filename, s3_key) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(cv_id)
    .bind(job_id)
    .bind(text)
    .bind(filename)
    .bind(s3_key)
    .execute(pool)
    .await?;

    info!("Stored CV {cv_id} ({filename}) for job {job_id}");
    Ok(())
}

pub async fn list_cvs(pool: &PgPool, job_id: Uuid) -> Result<Vec<CvRow>, sqlx::Error> {
    sqlx::query_as::<_, CvRow>("SELECT * FROM cvs WHERE job_id = $1 ORDER BY created_at, filename")
        .bind(job_id)
        .fetch_all(pool)
        .await
}

// ────────────────────────────────────────────────────────────────────────────
// Evaluations
// ────────────────────────────────────────────────────────────────────────────

/// Append-only: re-evaluating a CV inserts a new row; reads take the latest.
pub async fn store_evaluation(
    pool: &PgPool,
    cv_id: Uuid,
    outcome: &EvaluationOutcome,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let r = &outcome.record;
    sqlx::query(
        r#"
        INSERT INTO evaluations
            (id, cv_id, skill_score, cultural_score, overall_score,
             skill_assessment, cultural_assessment, summary, recommendation,
             raw_output, error_flag, status, transitions)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(id)
    .bind(cv_id)
    .bind(r.skill_score)
    .bind(r.cultural_score)
    .bind(r.overall_score)
    .bind(&r.skill_assessment)
    .bind(&r.cultural_assessment)
    .bind(&r.summary)
    .bind(&r.recommendation)
    .bind(&r.raw_output)
    .bind(r.error_flag)
    .bind(outcome.status.as_str())
    .bind(Json(&outcome.transitions))
    .execute(pool)
    .await?;

    info!("Stored evaluation {id} for CV {cv_id}");
    Ok(id)
}

/// Latest evaluation per CV of a job, best overall score first, ties by filename.
pub async fn ranked_results(
    pool: &PgPool,
    job_id: Uuid,
) -> Result<Vec<RankedResultRow>, sqlx::Error> {
    sqlx::query_as::<_, RankedResultRow>(
        r#"
        WITH latest AS (
            SELECT DISTINCT ON (e.cv_id) e.*
            FROM evaluations e
            JOIN cvs c ON c.id = e.cv_id
            WHERE c.job_id = $1
            ORDER BY e.cv_id, e.created_at DESC
        )
        SELECT
            c.id AS cv_id, c.filename,
            l.skill_score, l.cultural_score, l.overall_score,
            l.skill_assessment, l.cultural_assessment, l.summary, l.recommendation,
            l.error_flag, l.status, l.created_at AS evaluated_at
        FROM latest l
        JOIN cvs c ON c.id = l.cv_id
        ORDER BY l.overall_score DESC, c.filename
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}
