//! Error taxonomy of the video pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use engine::{EngineError, JobId, JobStage};

pub type MediaResult<T> = Result<T, MediaError>;

/// Failures of the fetch, raster and encode capabilities.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("empty response body from {0}")]
    EmptyBody(String),

    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg command failed: {message}{}", stderr_suffix(.stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("background task failed: {0}")]
    Task(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(tail) if !tail.is_empty() => format!(": {}", tail),
        _ => String::new(),
    }
}

impl From<tokio::task::JoinError> for MediaError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// One asset slot could not be filled with a usable product image.
/// Always absorbed by substituting a placeholder.
#[derive(Debug, Error)]
#[error("slot {slot} unusable after {attempts} attempt(s): {source}")]
pub struct SlotFailure {
    pub slot: usize,
    pub attempts: u32,
    #[source]
    pub source: MediaError,
}

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("encoder failed: {0}")]
    Encoder(#[source] MediaError),

    #[error("encoder finished without writing {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("could not publish {}: {source}", .path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: MediaError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Product data and script are required")]
    MissingBoth,

    #[error("Product data is required")]
    MissingProduct,

    #[error("Script is required")]
    MissingScript,
}

/// Fatal failure of a job, tagged with the stage it happened in.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("job {job_id} failed while {stage}: {source}")]
    Media {
        job_id: JobId,
        stage: JobStage,
        #[source]
        source: MediaError,
    },

    #[error("job {job_id} failed while composing: {source}")]
    Composition {
        job_id: JobId,
        #[source]
        source: CompositionError,
    },

    #[error("job {job_id} failed while {stage}: {source}")]
    State {
        job_id: JobId,
        stage: JobStage,
        #[source]
        source: EngineError,
    },

    #[error("job {job_id} timed out after {after:?} while {stage}")]
    TimedOut {
        job_id: JobId,
        stage: JobStage,
        after: Duration,
    },
}

impl PipelineError {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Validation(_) => None,
            Self::Media { job_id, .. }
            | Self::Composition { job_id, .. }
            | Self::State { job_id, .. }
            | Self::TimedOut { job_id, .. } => Some(*job_id),
        }
    }

    /// Stage the job was in when it failed; `None` for rejected requests.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            Self::Validation(_) => None,
            Self::Composition { .. } => Some(JobStage::Composing),
            Self::Media { stage, .. } | Self::State { stage, .. } | Self::TimedOut { stage, .. } => {
                Some(*stage)
            }
        }
    }
}
