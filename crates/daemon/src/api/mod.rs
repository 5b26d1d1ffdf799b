use axum::Router;
use std::sync::Arc;

use crate::jobs::pipeline::Pipeline;

pub mod jobs;
pub mod videos;

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .merge(videos::router(pipeline.clone()))
        .nest("/jobs", jobs::router(pipeline.jobs().clone()))
}
