use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use engine::render::{generate_render_command, RenderCommand};
use engine::{compile_ad, AdScript, AssetSet, JobId, RenderSettings};

use crate::error::{CompositionError, MediaError};
use crate::jobs::workspace::{publish, JobWorkspace};
use crate::media::ffmpeg::{EncodeEvent, Encoder};

/// Turns an asset set and a script into the published video file.
#[derive(Clone)]
pub struct Compositor {
    encoder: Arc<dyn Encoder>,
    settings: RenderSettings,
}

impl Compositor {
    pub fn new(encoder: Arc<dyn Encoder>, settings: RenderSettings) -> Self {
        Compositor { encoder, settings }
    }

    /// Render into the workspace, then move the result to `output_path`.
    /// On failure neither the render nor `output_path` is left behind.
    pub async fn compose(
        &self,
        job_id: JobId,
        assets: &AssetSet,
        script: &AdScript,
        workspace: &JobWorkspace,
        output_path: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), CompositionError> {
        let timeline = compile_ad(assets, script, self.settings.clone());
        let total_secs = f64::from(timeline.duration_secs());
        let command = generate_render_command(&timeline, workspace.render_path());
        info!(
            job_id = %job_id,
            clips = timeline.clips.len(),
            duration_secs = total_secs,
            "Composing video"
        );

        let result = self.render_and_publish(job_id, &command, total_secs, output_path, on_progress).await;
        if result.is_err() {
            remove_if_present(&command.output_path).await;
            remove_if_present(output_path).await;
        }
        result
    }

    async fn render_and_publish(
        &self,
        job_id: JobId,
        command: &RenderCommand,
        total_secs: f64,
        output_path: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), CompositionError> {
        let on_event = |event: EncodeEvent| match event {
            EncodeEvent::Started { command_line } => {
                debug!(job_id = %job_id, "Encoder started: {}", command_line)
            }
            EncodeEvent::Progress { out_time } => {
                if total_secs > 0.0 {
                    on_progress(out_time.as_secs_f64() / total_secs);
                }
            }
            EncodeEvent::Finished { duration_secs } => {
                info!(job_id = %job_id, ?duration_secs, "Encoder finished")
            }
            EncodeEvent::Failed { message } => {
                warn!(job_id = %job_id, "Encoder failed: {}", message)
            }
        };

        self.encoder
            .encode(command, &on_event)
            .await
            .map_err(CompositionError::Encoder)?;

        match fs::metadata(&command.output_path).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Err(CompositionError::MissingOutput(command.output_path.clone())),
        }

        publish(&command.output_path, output_path)
            .await
            .map_err(|e| CompositionError::Publish {
                path: output_path.to_path_buf(),
                source: MediaError::Io(e),
            })?;

        info!(job_id = %job_id, "Video written to {}", output_path.display());
        Ok(())
    }
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
