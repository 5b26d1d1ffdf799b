//! Per-job scratch directory. Every intermediate file of a job lives under
//! `<temp_dir>/<job_id>/` and carries the job id in its name, so concurrent
//! jobs never touch each other's files.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use engine::JobId;

// EXDEV on Linux and macOS
const CROSS_DEVICE_ERRNO: i32 = 18;

/// Removed by `cleanup`, or synchronously on drop if the job future is
/// dropped before reaching it.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: JobId,
    root: PathBuf,
    removed: bool,
}

impl JobWorkspace {
    pub async fn create(temp_dir: &Path, job_id: JobId) -> io::Result<Self> {
        let root = temp_dir.join(job_id.to_string());
        fs::create_dir_all(&root).await?;
        Ok(JobWorkspace {
            job_id,
            root,
            removed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_path(&self, slot: usize) -> PathBuf {
        self.root.join(format!("{}_img_{}.download", self.job_id, slot))
    }

    pub fn resized_path(&self, slot: usize) -> PathBuf {
        self.root.join(format!("{}_resized_{}.jpg", self.job_id, slot))
    }

    pub fn placeholder_path(&self, slot: usize) -> PathBuf {
        self.root.join(format!("{}_placeholder_{}.png", self.job_id, slot))
    }

    /// Where the encoder writes before the result is published.
    pub fn render_path(&self) -> PathBuf {
        self.root.join(format!("{}_render.mp4", self.job_id))
    }

    /// Remove the workspace and everything in it.
    pub async fn cleanup(mut self) {
        self.removed = true;
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(job_id = %self.job_id, "Workspace removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %self.job_id,
                "Failed to remove workspace {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => warn!(job_id = %self.job_id, "Workspace removed after job was dropped"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %self.job_id,
                "Failed to remove abandoned workspace {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

/// Move a finished file to `dest`. Across filesystems the bytes are copied to
/// a sibling temp name first so `dest` only ever appears complete.
pub async fn publish(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERRNO) => {
            debug!("Cross-device publish, copying {} -> {}", src.display(), dest.display());
            let staging = dest.with_extension("partial");
            if let Err(e) = fs::copy(src, &staging).await {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
            if let Err(e) = fs::rename(&staging, dest).await {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
            let _ = fs::remove_file(src).await;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
