//! Daemon configuration, read from the environment (and `.env` when present).

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use engine::retry::{RetryPolicy, DEFAULT_BACKOFF_STEP, DEFAULT_DOWNLOAD_ATTEMPTS};

use crate::jobs::DEFAULT_JOB_RETENTION;
use crate::media::fetch::DEFAULT_MAX_IMAGE_BYTES;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub port: u16,
    /// Static root; rendered videos land in `<public_dir>/videos`.
    pub public_dir: PathBuf,
    /// Per-job workspaces are created under this directory.
    pub temp_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub font_file: Option<PathBuf>,
    pub download_timeout: Duration,
    pub download_attempts: u32,
    pub retry_step: Duration,
    pub max_image_bytes: u64,
    pub job_timeout: Option<Duration>,
    /// How long finished jobs stay queryable.
    pub job_retention: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: String::from("127.0.0.1"),
            port: 5000,
            public_dir: PathBuf::from("./public"),
            temp_dir: PathBuf::from("./temp"),
            ffmpeg_bin: String::from("ffmpeg"),
            ffprobe_bin: String::from("ffprobe"),
            font_file: None,
            download_timeout: Duration::from_secs(15),
            download_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            retry_step: DEFAULT_BACKOFF_STEP,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            job_timeout: None,
            job_retention: DEFAULT_JOB_RETENTION,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);
        let download_timeout = parse_var(&lookup, "ADREEL_DOWNLOAD_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.download_timeout);
        let download_attempts =
            parse_var(&lookup, "ADREEL_DOWNLOAD_ATTEMPTS")?.unwrap_or(defaults.download_attempts);
        let retry_step = parse_var(&lookup, "ADREEL_RETRY_STEP_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_step);
        let max_image_bytes =
            parse_var(&lookup, "ADREEL_MAX_IMAGE_BYTES")?.unwrap_or(defaults.max_image_bytes);
        let job_timeout = parse_var(&lookup, "ADREEL_JOB_TIMEOUT_SECS")?.map(Duration::from_secs);
        let job_retention = parse_var(&lookup, "ADREEL_JOB_RETENTION_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.job_retention);

        Ok(Self {
            addr: lookup("ADREEL_ADDR").unwrap_or(defaults.addr),
            port,
            public_dir: lookup("ADREEL_PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            temp_dir: lookup("ADREEL_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            ffmpeg_bin: lookup("ADREEL_FFMPEG").unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: lookup("ADREEL_FFPROBE").unwrap_or(defaults.ffprobe_bin),
            font_file: lookup("ADREEL_FONT_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            download_timeout,
            download_attempts,
            retry_step,
            max_image_bytes,
            job_timeout,
            job_retention,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.addr, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.addr, self.port))
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.public_dir.join("videos")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.download_attempts, self.retry_step)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        _ => Ok(None),
    }
}
