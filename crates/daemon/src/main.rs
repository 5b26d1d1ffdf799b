use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tokio::sync::broadcast;
use tracing::{debug, info, level_filters::LevelFilter, warn};

mod api;
mod config;
mod error;
mod jobs;
mod media;

use config::Config;
use jobs::pipeline::Pipeline;
use jobs::{JobEvent, JobManager};
use media::ffmpeg::FFmpegWrapper;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn log_job_events(mut events: broadcast::Receiver<JobEvent>) {
    loop {
        match events.recv().await {
            Ok(JobEvent::Progress { job_id, progress }) => {
                debug!(job_id = %job_id, "Encode progress {:.0}%", progress * 100.0)
            }
            Ok(JobEvent::Completed { job_id, output_path }) => {
                info!(job_id = %job_id, "Published {}", output_path.display())
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Job event log lagged, skipped {} events", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();

    let config = Config::from_env()?;

    let videos_dir = config.videos_dir();
    std::fs::create_dir_all(&videos_dir)?;
    std::fs::create_dir_all(&config.temp_dir)?;
    info!("Serving videos from {:?}, workspaces under {:?}", videos_dir, config.temp_dir);

    let ffmpeg = FFmpegWrapper::new(config.ffmpeg_bin.clone(), config.ffprobe_bin.clone());
    if !ffmpeg.is_available() {
        warn!("{} not found on PATH; video generation will fail", config.ffmpeg_bin);
    }

    let job_manager = Arc::new(JobManager::with_retention(config.job_retention));
    tokio::spawn(log_job_events(job_manager.subscribe()));
    let pipeline = Arc::new(Pipeline::new(&config, Arc::new(ffmpeg), job_manager)?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api::router(pipeline))
        .nest_service("/videos", ServeDir::new(&videos_dir))
        .layer(cors);

    let addr = config.socket_addr()?;
    info!("Starting adreel server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
