//! Job submission and inspection handlers.

use super::{JobCancelled, JobCreated};
use crate::api::AppState;
use crate::app::{MovieJobRequest, MusicJobRequest, TvJobRequest};
use crate::error::{Error, JobError};
use crate::job::JobView;
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

fn created(job_id: JobId) -> Response {
    (StatusCode::CREATED, Json(JobCreated { job_id })).into_response()
}

/// POST /jobs - Queue a TV playlist job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = TvJobRequest,
    responses(
        (status = 201, description = "Job queued", body = JobCreated),
        (status = 400, description = "Missing or invalid parameters"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<TvJobRequest>,
) -> Result<Response, Error> {
    let job_id = state.tubarr.create_job(request).await?;
    Ok(created(job_id))
}

/// GET /jobs - List jobs without their message logs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    responses(
        (status = 200, description = "All known jobs, newest first", body = Vec<JobView>)
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tubarr.list_jobs())
}

/// GET /jobs/{id} - Full job state including recent messages
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job state", body = JobView),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, Error> {
    let id = JobId::from(id);
    state
        .tubarr
        .get_job(&id)
        .map(Json)
        .ok_or_else(|| JobError::NotFound { id: id.0 }.into())
}

/// DELETE /jobs/{id} - Cancel a queued or running job
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job cancelled", body = JobCancelled),
        (status = 404, description = "Job not found or already finished")
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobCancelled>, Error> {
    let job_id = JobId::from(id);
    if !state.tubarr.cancel_job(&job_id) {
        return Err(Error::NotFound(format!(
            "job {job_id} not found or already finished"
        )));
    }
    Ok(Json(JobCancelled {
        job_id,
        status: "cancelled".to_string(),
    }))
}

/// POST /movies - Queue a single-video movie job
#[utoipa::path(
    post,
    path = "/api/v1/movies",
    tag = "jobs",
    request_body = MovieJobRequest,
    responses(
        (status = 201, description = "Job queued", body = JobCreated),
        (status = 400, description = "Missing or invalid parameters"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn create_movie_job(
    State(state): State<AppState>,
    Json(request): Json<MovieJobRequest>,
) -> Result<Response, Error> {
    let job_id = state.tubarr.create_movie_job(request).await?;
    Ok(created(job_id))
}

/// POST /music - Queue an album job
#[utoipa::path(
    post,
    path = "/api/v1/music",
    tag = "jobs",
    request_body = MusicJobRequest,
    responses(
        (status = 201, description = "Job queued", body = JobCreated),
        (status = 400, description = "Missing or invalid parameters"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn create_music_job(
    State(state): State<AppState>,
    Json(request): Json<MusicJobRequest>,
) -> Result<Response, Error> {
    let job_id = state.tubarr.create_music_job(request).await?;
    Ok(created(job_id))
}
