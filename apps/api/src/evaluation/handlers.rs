use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::job_store::StoreError;
use crate::models::job::{Job, JobDescriptor, JobError, JobInput, JobStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub cv_id: String,
    pub report_id: String,
}

/// POST /upload — multipart upload of the candidate CV and project report.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut cv_id: Option<String> = None;
    let mut report_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cv" | "report" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read '{name}': {e}")))?;
                let doc_ref = state
                    .uploads
                    .save(&name, &bytes)
                    .await
                    .map_err(|e| AppError::Storage(e.to_string()))?;
                if name == "cv" {
                    cv_id = Some(doc_ref);
                } else {
                    report_id = Some(doc_ref);
                }
            }
            _ => continue,
        }
    }

    let (cv_id, report_id) = match (cv_id, report_id) {
        (Some(cv), Some(report)) => (cv, report),
        _ => {
            return Err(AppError::Validation(
                "Both cv and report files are required".to_string(),
            ))
        }
    };

    Ok(Json(UploadResponse {
        message: "Files uploaded successfully".to_string(),
        cv_id,
        report_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub job_title: String,
    pub cv_id: String,
    pub report_id: String,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// POST /evaluate — accepts a job for asynchronous evaluation.
///
/// The job store is seeded with `status=queued` before the descriptor is
/// enqueued, so a submission is only acknowledged once it is observable via
/// the status endpoint.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<(StatusCode, Json<EvaluateResponse>), AppError> {
    if req.job_title.trim().is_empty() || req.cv_id.trim().is_empty() || req.report_id.trim().is_empty()
    {
        return Err(AppError::Validation(
            "job_title, cv_id, and report_id are required".to_string(),
        ));
    }

    let job_id = Uuid::new_v4();
    let input = JobInput {
        job_title: req.job_title,
        cv_ref: req.cv_id,
        report_ref: req.report_id,
    };

    state
        .jobs
        .create(Job::queued(job_id, input.clone()))
        .await
        .map_err(|e| match e {
            StoreError::Conflict(id) => {
                AppError::Conflict(format!("job {id} is already submitted"))
            }
            other => AppError::Internal(anyhow::anyhow!(other)),
        })?;

    let descriptor = JobDescriptor::from_input(job_id, &input);
    if let Err(e) = state.transport.enqueue(&descriptor).await {
        // Never leave a job stuck in `queued` with nothing to deliver it.
        let _ = state
            .jobs
            .fail(
                job_id,
                JobError {
                    stage: None,
                    kind: "QueueError".to_string(),
                    message: e.to_string(),
                },
            )
            .await;
        return Err(AppError::Internal(anyhow::anyhow!(
            "failed to enqueue job {job_id}: {e}"
        )));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(EvaluateResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// GET /result/:id — current state of a job, including the structured result
/// or the failure description once terminal.
pub async fn handle_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    state
        .jobs
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}
