use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use vget_core::JobStatus;

use super::error::ApiError;
use super::models::{FindQuery, JobView, SubmitRequest, SubmitResponse};
use super::AppState;

/// `POST /jobs`. Creates a job and schedules its acquisition, or returns an
/// existing completed job for the same URL without scheduling anything.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.engine.submit(&body.url, body.output_type).await?;
    // a fresh job starts pending, so a terminal status means the record was reused
    let status = if job.status == JobStatus::Completed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(SubmitResponse::from(&job))))
}

/// `GET /jobs/{job_id}`.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .engine
        .status(&job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))?;
    Ok(Json(JobView::from(job)))
}

/// `GET /jobs?url=`. Only completed jobs are addressable by URL.
pub async fn find_job(
    State(state): State<AppState>,
    Query(query): Query<FindQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .engine
        .find_by_url(&query.url)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no completed job for {}", query.url)))?;
    Ok(Json(JobView::from(job)))
}

/// `GET /health` liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
