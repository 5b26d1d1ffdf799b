use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use engine::JobId;

use crate::error::PipelineError;
use crate::jobs::pipeline::{Pipeline, VideoRequest};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    success: bool,
    video_url: String,
    video_id: JobId,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/generate-video", post(generate_video))
        .with_state(pipeline)
}

async fn generate_video(
    State(pipeline): State<Arc<Pipeline>>,
    Json(req): Json<VideoRequest>,
) -> Result<Json<GenerateVideoResponse>, (StatusCode, Json<Value>)> {
    // The job runs to completion even if the client disconnects
    let handle = tokio::spawn(async move { pipeline.run(req).await });
    let result = handle.await.map_err(|e| {
        error!("Video generation task failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Video generation task failed: {e}") })),
        )
    })?;

    let output = result.map_err(|e| {
        warn!(job_id = ?e.job_id(), stage = ?e.stage(), "Video generation failed: {}", e);
        let status = match e {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": e.to_string() })))
    })?;

    Ok(Json(GenerateVideoResponse {
        success: true,
        video_url: format!("/videos/{}.mp4", output.job_id),
        video_id: output.job_id,
    }))
}
