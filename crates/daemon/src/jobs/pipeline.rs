//! Job orchestration: validate, acquire, normalize, compose, clean up.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use engine::{AdScript, AssetOrigin, AssetSet, JobId, JobStage, ProductData, RenderSettings, VideoJob};

use crate::config::Config;
use crate::error::{MediaResult, PipelineError, ValidationError};
use crate::jobs::acquire::AcquisitionManager;
use crate::jobs::compose::Compositor;
use crate::jobs::normalize::Normalizer;
use crate::jobs::workspace::JobWorkspace;
use crate::jobs::JobManager;
use crate::media::fetch::ImageFetcher;
use crate::media::ffmpeg::Encoder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub product_data: Option<ProductData>,
    pub script: Option<AdScript>,
}

impl VideoRequest {
    pub fn validate(self) -> Result<(ProductData, AdScript), ValidationError> {
        match (self.product_data, self.script) {
            (Some(product), Some(script)) => Ok((product, script)),
            (None, None) => Err(ValidationError::MissingBoth),
            (None, Some(_)) => Err(ValidationError::MissingProduct),
            (Some(_), None) => Err(ValidationError::MissingScript),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutput {
    pub job_id: JobId,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub job_timeout: Option<Duration>,
}

pub struct Pipeline {
    settings: PipelineSettings,
    acquisition: AcquisitionManager,
    normalizer: Normalizer,
    compositor: Compositor,
    jobs: Arc<JobManager>,
}

impl Pipeline {
    pub fn new(config: &Config, encoder: Arc<dyn Encoder>, jobs: Arc<JobManager>) -> MediaResult<Self> {
        let render = RenderSettings {
            font_file: config.font_file.clone(),
            ..RenderSettings::default()
        };
        let fetcher = ImageFetcher::new(config.download_timeout, config.retry_policy())?
            .with_max_bytes(config.max_image_bytes);

        Ok(Pipeline::from_parts(
            PipelineSettings {
                temp_dir: config.temp_dir.clone(),
                output_dir: config.videos_dir(),
                job_timeout: config.job_timeout,
            },
            AcquisitionManager::new(fetcher, render.canvas),
            Normalizer::new(render.canvas),
            Compositor::new(encoder, render),
            jobs,
        ))
    }

    pub fn from_parts(
        settings: PipelineSettings,
        acquisition: AcquisitionManager,
        normalizer: Normalizer,
        compositor: Compositor,
        jobs: Arc<JobManager>,
    ) -> Self {
        Pipeline {
            settings,
            acquisition,
            normalizer,
            compositor,
            jobs,
        }
    }

    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    /// Produce one video. The job's workspace is removed whatever the outcome.
    pub async fn run(&self, request: VideoRequest) -> Result<JobOutput, PipelineError> {
        let (product, script) = request.validate()?;

        let mut job = VideoJob::new(JobId::new(), &self.settings.output_dir);
        let job_id = job.id();
        self.jobs.create_job(&job);
        info!(job_id = %job_id, images = product.images.len(), "Job created");
        // Declared before the workspace so the workspace is removed first on drop
        let _abandoned = AbandonGuard {
            jobs: &self.jobs,
            job_id,
            output_path: job.output_path().to_path_buf(),
        };

        let workspace = match JobWorkspace::create(&self.settings.temp_dir, job_id).await {
            Ok(ws) => {
                debug!(job_id = %job_id, "Workspace at {}", ws.root().display());
                ws
            }
            Err(e) => {
                let err = PipelineError::Media {
                    job_id,
                    stage: job.stage(),
                    source: e.into(),
                };
                self.fail(&mut job, &err).await;
                return Err(err);
            }
        };

        let result = match self.settings.job_timeout {
            Some(limit) => {
                let outcome =
                    tokio::time::timeout(limit, self.execute(&mut job, &product, &script, &workspace)).await;
                outcome.unwrap_or_else(|_| {
                    Err(PipelineError::TimedOut {
                        job_id,
                        stage: job.stage(),
                        after: limit,
                    })
                })
            }
            None => self.execute(&mut job, &product, &script, &workspace).await,
        };

        workspace.cleanup().await;

        match result {
            Ok(()) => {
                info!(job_id = %job_id, "Job completed: {}", job.output_path().display());
                Ok(JobOutput {
                    job_id,
                    output_path: job.output_path().to_path_buf(),
                })
            }
            Err(err) => {
                self.fail(&mut job, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        job: &mut VideoJob,
        product: &ProductData,
        script: &AdScript,
        workspace: &JobWorkspace,
    ) -> Result<(), PipelineError> {
        let job_id = job.id();

        self.transition(job, JobStage::Acquiring)?;
        let acquired = self
            .acquisition
            .acquire(&product.images, workspace)
            .await
            .map_err(|source| PipelineError::Media {
                job_id,
                stage: JobStage::Acquiring,
                source,
            })?;

        self.transition(job, JobStage::Normalizing)?;
        let normalized = self
            .normalizer
            .normalize(acquired, workspace)
            .await
            .map_err(|source| PipelineError::Media {
                job_id,
                stage: JobStage::Normalizing,
                source,
            })?;
        let assets = AssetSet::new(normalized).map_err(|source| PipelineError::State {
            job_id,
            stage: JobStage::Normalizing,
            source,
        })?;
        info!(
            job_id = %job_id,
            downloaded = assets.count_origin(AssetOrigin::Downloaded),
            placeholders = assets.count_origin(AssetOrigin::Placeholder),
            "Assets ready"
        );

        self.transition(job, JobStage::Composing)?;
        let jobs = &self.jobs;
        self.compositor
            .compose(job_id, &assets, script, workspace, job.output_path(), &|progress| {
                jobs.update_progress(job_id, progress)
            })
            .await
            .map_err(|source| PipelineError::Composition { job_id, source })?;

        self.transition(job, JobStage::Done)
    }

    fn transition(&self, job: &mut VideoJob, to: JobStage) -> Result<(), PipelineError> {
        let from = job.stage();
        job.advance(to).map_err(|source| PipelineError::State {
            job_id: job.id(),
            stage: from,
            source,
        })?;
        info!(job_id = %job.id(), stage = %to, "Job stage changed");
        self.jobs.update_job_stage(job);
        Ok(())
    }

    async fn fail(&self, job: &mut VideoJob, err: &PipelineError) {
        let failed_in = job.stage();
        if job.stage().can_transition_to(JobStage::Failed) {
            let _ = job.advance(JobStage::Failed);
        }

        // A timeout can land between publish and completion
        if let Err(e) = tokio::fs::remove_file(job.output_path()).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(job_id = %job.id(), "Failed to remove {}: {}", job.output_path().display(), e);
            }
        }

        error!(job_id = %job.id(), stage = %failed_in, "Job failed: {}", err);
        self.jobs.fail_job(job, failed_in, &err.to_string());
    }
}

/// Fails the registry record if `run` is dropped before the job ends.
struct AbandonGuard<'a> {
    jobs: &'a JobManager,
    job_id: JobId,
    output_path: PathBuf,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.jobs.abandon_job(self.job_id, "job abandoned before completion") {
            return;
        }
        warn!(job_id = %self.job_id, "Job dropped before completion");
        if let Err(e) = std::fs::remove_file(&self.output_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id = %self.job_id, "Failed to remove {}: {}", self.output_path.display(), e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::jobs::acquire::tests::{manager_for, png_bytes};
    use crate::jobs::compose::tests::{FailingEncoder, StubEncoder};
    use crate::error::CompositionError;
    use crate::media::ffmpeg::{EncodeEvent, FFmpegWrapper};
    use async_trait::async_trait;
    use engine::render::RenderCommand;
    use engine::Resolution;
    use std::path::Path;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SMALL_CANVAS: Resolution = Resolution {
        width: 54,
        height: 96,
    };

    struct SlowEncoder;

    #[async_trait]
    impl Encoder for SlowEncoder {
        async fn encode(
            &self,
            command: &RenderCommand,
            _on_event: &(dyn Fn(EncodeEvent) + Send + Sync),
        ) -> MediaResult<()> {
            tokio::fs::write(&command.output_path, b"partial").await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    pub(crate) fn pipeline(root: &Path, encoder: Arc<dyn Encoder>, job_timeout: Option<Duration>) -> Pipeline {
        pipeline_with(root, encoder, job_timeout, RenderSettings::default())
    }

    fn pipeline_with(
        root: &Path,
        encoder: Arc<dyn Encoder>,
        job_timeout: Option<Duration>,
        render: RenderSettings,
    ) -> Pipeline {
        Pipeline::from_parts(
            PipelineSettings {
                temp_dir: root.join("temp"),
                output_dir: root.join("public").join("videos"),
                job_timeout,
            },
            manager_for(SMALL_CANVAS),
            Normalizer::new(SMALL_CANVAS),
            Compositor::new(encoder, render),
            Arc::new(JobManager::new()),
        )
    }

    fn request(images: Vec<String>) -> VideoRequest {
        VideoRequest {
            product_data: Some(ProductData {
                title: "Trail Runner".to_string(),
                images,
                ..ProductData::default()
            }),
            script: Some(AdScript::new("Act now", "Limited stock", "Buy today")),
        }
    }

    fn workspace_is_empty(root: &Path) -> bool {
        std::fs::read_dir(root.join("temp"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn rejects_missing_fields_before_creating_a_job() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(StubEncoder::new()), None);

        let err = pipeline
            .run(VideoRequest {
                product_data: None,
                script: Some(AdScript::default()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::MissingProduct)));

        let err = pipeline.run(VideoRequest::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::MissingBoth)));
        assert!(!dir.path().join("temp").exists());
    }

    #[tokio::test]
    async fn request_deserializes_from_camel_case() {
        let request: VideoRequest = serde_json::from_str(
            r#"{"productData":{"title":"Mug","images":["http://x/1.jpg"]},"script":{"hook":"Hi"}}"#,
        )
        .unwrap();
        let (product, script) = request.validate().unwrap();
        assert_eq!(product.images.len(), 1);
        assert_eq!(script.hook, "Hi");
        assert_eq!(script.cta, "");
    }

    #[tokio::test]
    async fn no_images_renders_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(StubEncoder::new());
        let pipeline = pipeline(dir.path(), encoder.clone(), None);

        let output = pipeline.run(request(Vec::new())).await.unwrap();

        assert!(output.output_path.exists());
        assert_eq!(
            output.output_path,
            dir.path().join("public").join("videos").join(format!("{}.mp4", output.job_id))
        );
        let commands = encoder.commands.lock().unwrap();
        let inputs: Vec<_> = commands[0]
            .ffmpeg_args
            .iter()
            .filter(|a| a.contains("_placeholder_"))
            .collect();
        assert_eq!(inputs.len(), 3);

        let record = pipeline.jobs().get_job(output.job_id).unwrap();
        assert_eq!(record.stage, JobStage::Done);
        assert_eq!(record.progress, 1.0);
        assert!(workspace_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn reachable_images_are_all_used() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(120, 80)))
            .expect(3)
            .mount(&server)
            .await;
        let images = (0..3).map(|i| format!("{}/p{}.png", server.uri(), i)).collect();
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(StubEncoder::new());
        let pipeline = pipeline(dir.path(), encoder.clone(), None);

        let output = pipeline.run(request(images)).await.unwrap();

        assert!(output.output_path.exists());
        let commands = encoder.commands.lock().unwrap();
        let args = &commands[0].ffmpeg_args;
        assert_eq!(args.iter().filter(|a| a.contains("_resized_")).count(), 3);
        assert_eq!(args.iter().filter(|a| a.contains("_placeholder_")).count(), 0);
        assert_eq!(args.windows(2).filter(|w| w[0] == "-t" && w[1] == "3").count(), 3);
        assert!(workspace_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn encoder_failure_fails_job_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(FailingEncoder), None);
        let mut events = pipeline.jobs().subscribe();

        let err = pipeline.run(request(Vec::new())).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Composition {
                source: CompositionError::Encoder(_),
                ..
            }
        ));
        assert_eq!(err.stage(), Some(JobStage::Composing));
        let job_id = err.job_id().unwrap();
        let expected = dir.path().join("public").join("videos").join(format!("{job_id}.mp4"));
        assert!(!expected.exists());
        assert!(workspace_is_empty(dir.path()));

        let record = pipeline.jobs().get_job(job_id).unwrap();
        assert_eq!(record.stage, JobStage::Failed);
        let message = record.error.unwrap();
        assert!(message.contains("composing"));
        assert!(message.contains("Error while filtering"), "{message}");

        let mut failed_in = None;
        while let Ok(event) = events.try_recv() {
            if let crate::jobs::JobEvent::Failed { stage, .. } = event {
                failed_in = Some(stage);
            }
        }
        assert_eq!(failed_in, Some(JobStage::Composing));
    }

    #[tokio::test]
    async fn timeout_reports_running_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(SlowEncoder), Some(Duration::from_secs(1)));

        let err = pipeline.run(request(Vec::new())).await.unwrap_err();

        match err {
            PipelineError::TimedOut { stage, .. } => assert_eq!(stage, JobStage::Composing),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(workspace_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn dropped_job_cleans_up_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(SlowEncoder), None);
        let mut events = pipeline.jobs().subscribe();
        let mut run = Box::pin(pipeline.run(request(Vec::new())));

        let job_id = loop {
            tokio::select! {
                _ = &mut run => panic!("job finished while the encoder was sleeping"),
                event = events.recv() => {
                    if let Ok(crate::jobs::JobEvent::StageChanged { job_id, stage: JobStage::Composing }) = event {
                        break job_id;
                    }
                }
            }
        };
        // let the encoder write its partial file
        assert!(tokio::time::timeout(Duration::from_millis(200), &mut run).await.is_err());
        drop(run);

        assert!(workspace_is_empty(dir.path()));
        let record = pipeline.jobs().get_job(job_id).unwrap();
        assert_eq!(record.stage, JobStage::Failed);
        assert!(!record.output_path.exists());

        let mut failed_in = None;
        while let Ok(event) = events.try_recv() {
            if let crate::jobs::JobEvent::Failed { stage, .. } = event {
                failed_in = Some(stage);
            }
        }
        assert_eq!(failed_in, Some(JobStage::Composing));
    }

    #[tokio::test]
    async fn concurrent_jobs_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(StubEncoder::new()), None);

        let (a, b) = tokio::join!(pipeline.run(request(Vec::new())), pipeline.run(request(Vec::new())));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.job_id, b.job_id);
        assert!(a.output_path.exists());
        assert!(b.output_path.exists());
    }

    #[tokio::test]
    async fn renders_nine_second_video_with_ffmpeg() {
        let wrapper = FFmpegWrapper::default();
        if !wrapper.is_available() || which::which("ffprobe").is_err() {
            eprintln!("ffmpeg not on PATH, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(wrapper.clone()), None);
        // drawtext needs a usable system font, so this run carries no text
        let request = VideoRequest {
            product_data: Some(ProductData::default()),
            script: Some(AdScript::default()),
        };

        let output = pipeline.run(request).await.unwrap();

        let info = wrapper.probe(&output.output_path).await.unwrap();
        assert!((info.duration_secs - 9.0).abs() < 0.2, "duration {}", info.duration_secs);
        assert_eq!((info.width, info.height), (1080, 1920));
        assert!(!info.has_audio);
        assert!(workspace_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn renders_overlaid_video_with_configured_font() {
        let Ok(font) = std::env::var("ADREEL_FONT_FILE") else {
            eprintln!("ADREEL_FONT_FILE not set, skipping");
            return;
        };
        let font = PathBuf::from(font);
        let wrapper = FFmpegWrapper::default();
        if !font.is_file() || !wrapper.is_available() || which::which("ffprobe").is_err() {
            eprintln!("font or ffmpeg unavailable, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let render = RenderSettings {
            font_file: Some(font),
            ..RenderSettings::default()
        };
        let pipeline = pipeline_with(dir.path(), Arc::new(wrapper.clone()), None, render);

        let output = pipeline.run(request(Vec::new())).await.unwrap();

        let info = wrapper.probe(&output.output_path).await.unwrap();
        assert!((info.duration_secs - 9.0).abs() < 0.2, "duration {}", info.duration_secs);
        assert_eq!((info.width, info.height), (1080, 1920));
        assert!(!info.has_audio);
        assert!(workspace_is_empty(dir.path()));
    }
}
