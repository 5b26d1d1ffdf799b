use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use engine::{JobId, JobStage};

use crate::jobs::JobManager;

#[derive(Serialize)]
pub struct JobResponse {
    id: JobId,
    stage: JobStage,
    progress: f64,
    output_path: String,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

pub fn router(job_manager: Arc<JobManager>) -> Router {
    Router::new()
        .route("/:id", get(get_job))
        .with_state(job_manager)
}

async fn get_job(
    State(job_manager): State<Arc<JobManager>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, StatusCode> {
    let id: JobId = id.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let job = job_manager.get_job(id).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(JobResponse {
        id: job.id,
        stage: job.stage,
        progress: job.progress,
        output_path: job.output_path.to_string_lossy().to_string(),
        error: job.error,
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
    }))
}
