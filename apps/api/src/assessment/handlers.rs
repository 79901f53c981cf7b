use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assessment::pdf::{extract_text, is_pdf};
use crate::assessment::service::EvaluationStatus;
use crate::assessment::store::{
    archive_pdf, cv_object_key, get_job, job_exists, job_object_key, list_cvs, list_jobs,
    ranked_results, store_cv, store_evaluation, store_job,
};
use crate::errors::AppError;
use crate::models::evaluation::RankedResultRow;
use crate::models::job::JobSummaryRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct JobUploadResponse {
    pub job_id: Uuid,
    pub message: String,
}

#[derive(Serialize)]
pub struct UploadedCv {
    pub cv_id: Uuid,
    pub filename: String,
}

#[derive(Serialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct CvUploadResponse {
    pub uploaded_cvs: Vec<UploadedCv>,
    pub skipped: Vec<SkippedFile>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CvEvaluationResult {
    pub cv_id: Uuid,
    pub filename: String,
    /// `completed`, `incomplete` or `failed`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CvEvaluationResult {
    fn failed(cv_id: Uuid, filename: &str, error: impl Into<String>) -> Self {
        Self {
            cv_id,
            filename: filename.to_string(),
            status: "failed".to_string(),
            overall_score: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub job_id: Uuid,
    pub results: Vec<CvEvaluationResult>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ResultsResponse {
    pub job_id: Uuid,
    pub results: Vec<RankedResultRow>,
}

struct UploadedFile {
    filename: String,
    data: Bytes,
}

async fn next_file(multipart: &mut Multipart) -> Result<Option<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        return Ok(Some(UploadedFile { filename, data }));
    }
    Ok(None)
}

/// POST /api/v1/jobs
pub async fn handle_upload_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<JobUploadResponse>, AppError> {
    let file = next_file(&mut multipart)
        .await?
        .ok_or_else(|| AppError::Validation("A PDF file is required".to_string()))?;
    if !is_pdf(&file.data) {
        return Err(AppError::Validation("Only PDF files are accepted".to_string()));
    }

    let text = extract_text(file.data.clone()).await?;
    let job_id = Uuid::new_v4();
    let s3_key = job_object_key(job_id, &file.filename);
    archive_pdf(&state.s3, &state.config.s3_bucket, &s3_key, file.data)
        .await
        .map_err(|e| AppError::S3(e.to_string()))?;
    store_job(&state.db, job_id, &text, &file.filename, Some(&s3_key)).await?;

    Ok(Json(JobUploadResponse {
        job_id,
        message: "Job description uploaded successfully".to_string(),
    }))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobSummaryRow>>, AppError> {
    Ok(Json(list_jobs(&state.db).await?))
}

/// POST /api/v1/jobs/:job_id/cvs
pub async fn handle_upload_cvs(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<CvUploadResponse>, AppError> {
    if !job_exists(&state.db, job_id).await? {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }

    let mut uploaded_cvs = Vec::new();
    let mut skipped = Vec::new();

    while let Some(file) = next_file(&mut multipart).await? {
        let text = match extract_text(file.data.clone()).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {e}", file.filename);
                skipped.push(SkippedFile {
                    filename: file.filename,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let cv_id = Uuid::new_v4();
        let s3_key = cv_object_key(job_id, cv_id);
        archive_pdf(&state.s3, &state.config.s3_bucket, &s3_key, file.data)
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;
        store_cv(&state.db, cv_id, job_id, &text, &file.filename, Some(&s3_key)).await?;
        uploaded_cvs.push(UploadedCv {
            cv_id,
            filename: file.filename,
        });
    }

    let message = format!("Uploaded {} CVs successfully", uploaded_cvs.len());
    Ok(Json(CvUploadResponse {
        uploaded_cvs,
        skipped,
        message,
    }))
}

/// POST /api/v1/jobs/:job_id/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let job = get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
    let cvs = list_cvs(&state.db, job_id).await?;
    if cvs.is_empty() {
        return Err(AppError::Validation(format!(
            "No CVs uploaded for job {job_id}"
        )));
    }

    info!(
        "Evaluating {} CVs for job {job_id} (concurrency {})",
        cvs.len(),
        state.config.evaluation_concurrency
    );

    let job_text: Arc<str> = Arc::from(job.text);
    let semaphore = Arc::new(Semaphore::new(state.config.evaluation_concurrency));
    let mut results: Vec<CvEvaluationResult> = cvs
        .iter()
        .map(|cv| CvEvaluationResult::failed(cv.id, &cv.filename, "evaluation task aborted"))
        .collect();

    let mut join_set = JoinSet::new();
    for (idx, cv) in cvs.into_iter().enumerate() {
        let evaluator = Arc::clone(&state.evaluator);
        let db = state.db.clone();
        let job_text = Arc::clone(&job_text);
        let semaphore = Arc::clone(&semaphore);

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();

            let result = match evaluator.evaluate(&cv.text, &job_text).await {
                Ok(outcome) => match store_evaluation(&db, cv.id, &outcome).await {
                    Ok(_) => CvEvaluationResult {
                        cv_id: cv.id,
                        filename: cv.filename.clone(),
                        status: outcome.status.as_str().to_string(),
                        overall_score: Some(outcome.record.overall_score),
                        error: None,
                    },
                    Err(e) => {
                        error!("Failed to store evaluation for {}: {e}", cv.filename);
                        CvEvaluationResult::failed(cv.id, &cv.filename, "failed to store evaluation")
                    }
                },
                Err(e) => {
                    error!("Evaluation of {} failed: {e}", cv.filename);
                    CvEvaluationResult::failed(cv.id, &cv.filename, e.to_string())
                }
            };
            (idx, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, result)) => results[idx] = result,
            Err(e) => error!("Evaluation task panicked: {e}"),
        }
    }

    let completed = results
        .iter()
        .filter(|r| r.status == EvaluationStatus::Completed.as_str())
        .count();
    let message = format!("Evaluated {completed} of {} CVs", results.len());
    info!("{message} for job {job_id}");

    Ok(Json(EvaluateResponse {
        job_id,
        results,
        message,
    }))
}

/// GET /api/v1/jobs/:job_id/results
pub async fn handle_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<ResultsResponse>, AppError> {
    if !job_exists(&state.db, job_id).await? {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }
    let results = ranked_results(&state.db, job_id).await?;
    Ok(Json(ResultsResponse { job_id, results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_serializes_error_without_score() {
        let result = CvEvaluationResult::failed(Uuid::nil(), "jane.pdf", "boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert!(json.get("overall_score").is_none());
    }
}
