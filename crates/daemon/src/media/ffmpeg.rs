use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use engine::render::RenderCommand;

use crate::error::{MediaError, MediaResult};

/// Keep this much of the encoder's stderr in error reports.
const STDERR_TAIL_BYTES: usize = 4096;

/// Observable lifecycle of one encoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeEvent {
    Started { command_line: String },
    Progress { out_time: Duration },
    Finished { duration_secs: Option<f64> },
    Failed { message: String },
}

/// The video composition/encoding capability.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run `command` to completion. Events are delivered in order; exactly
    /// one of `Finished` / `Failed` ends a run that emitted `Started`.
    async fn encode(
        &self,
        command: &RenderCommand,
        on_event: &(dyn Fn(EncodeEvent) + Send + Sync),
    ) -> MediaResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: i32,
    pub height: i32,
    pub has_audio: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutput {
    format: Option<FormatInfo>,
    streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    width: Option<i32>,
    height: Option<i32>,
}

/// Drives the `ffmpeg` / `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FFmpegWrapper {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Default for FFmpegWrapper {
    fn default() -> Self {
        FFmpegWrapper::new("ffmpeg", "ffprobe")
    }
}

impl FFmpegWrapper {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        FFmpegWrapper {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.ffmpeg_bin).is_ok()
    }

    pub async fn probe(&self, media_path: &Path) -> MediaResult<MediaInfo> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,width,height",
                "-of",
                "json",
            ])
            .arg(media_path)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::ffmpeg_failed(
                "ffprobe failed",
                Some(stderr.into_owned()),
                output.status.code(),
            ));
        }

        let probe_output: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
            MediaError::ffmpeg_failed(format!("unreadable ffprobe output: {}", e), None, None)
        })?;

        let duration_secs = probe_output
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let video_stream = probe_output
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));

        let (width, height) = video_stream
            .map(|vs| (vs.width.unwrap_or(0), vs.height.unwrap_or(0)))
            .unwrap_or((0, 0));

        let has_audio = probe_output
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        Ok(MediaInfo {
            duration_secs,
            width,
            height,
            has_audio,
        })
    }

    async fn run(
        &self,
        command: &RenderCommand,
        on_event: &(dyn Fn(EncodeEvent) + Send + Sync),
    ) -> MediaResult<()> {
        let mut child = Command::new(&self.ffmpeg_bin)
            .args(&command.ffmpeg_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Drain stderr concurrently so a chatty encoder never blocks on a full pipe
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(out_time) = parse_progress_line(&line) {
                    on_event(EncodeEvent::Progress { out_time });
                }
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("ffmpeg exited with {}", status),
                Some(stderr_tail(&stderr)),
                status.code(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Encoder for FFmpegWrapper {
    async fn encode(
        &self,
        command: &RenderCommand,
        on_event: &(dyn Fn(EncodeEvent) + Send + Sync),
    ) -> MediaResult<()> {
        which::which(&self.ffmpeg_bin)
            .map_err(|e| MediaError::FfmpegNotFound(format!("{}: {}", self.ffmpeg_bin, e)))?;

        let command_line = command.command_line(&self.ffmpeg_bin);
        debug!("Running FFmpeg: {}", command_line);
        on_event(EncodeEvent::Started { command_line });

        if let Err(e) = self.run(command, on_event).await {
            on_event(EncodeEvent::Failed {
                message: e.to_string(),
            });
            return Err(e);
        }

        let duration_secs = match self.probe(&command.output_path).await {
            Ok(info) => Some(info.duration_secs),
            Err(e) => {
                warn!("Could not probe {}: {}", command.output_path.display(), e);
                None
            }
        };
        on_event(EncodeEvent::Finished { duration_secs });
        Ok(())
    }
}

/// Output position from a `-progress` key=value line.
pub fn parse_progress_line(line: &str) -> Option<Duration> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // Both keys carry microseconds
        "out_time_us" | "out_time_ms" => value.parse::<u64>().ok().map(Duration::from_micros),
        _ => None,
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
