use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use engine::{JobId, JobStage, VideoJob};

pub mod acquire;
pub mod compose;
pub mod normalize;
pub mod pipeline;
pub mod workspace;

const EVENT_CAPACITY: usize = 256;

/// Finished jobs older than this are dropped from the registry.
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    StageChanged { job_id: JobId, stage: JobStage },
    Progress { job_id: JobId, progress: f64 },
    Completed { job_id: JobId, output_path: PathBuf },
    Failed { job_id: JobId, stage: JobStage, message: String },
}

/// Snapshot of a job as seen by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub stage: JobStage,
    pub output_path: PathBuf,
    pub progress: f64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registry of job snapshots. The orchestrator owns each `VideoJob` and
/// reports every change here; readers only ever see copies.
pub struct JobManager {
    jobs: Mutex<HashMap<JobId, Job>>,
    events: broadcast::Sender<JobEvent>,
    retention: Duration,
}

impl Default for JobManager {
    fn default() -> Self {
        JobManager::new()
    }
}

impl JobManager {
    pub fn new() -> Self {
        JobManager::with_retention(DEFAULT_JOB_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        JobManager {
            jobs: Mutex::new(HashMap::new()),
            events,
            retention,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Register `job`. Finished jobs past the retention window are pruned.
    pub fn create_job(&self, job: &VideoJob) {
        let now = Utc::now();
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, record| {
            let age = now.signed_duration_since(record.updated_at).to_std().unwrap_or_default();
            !record.stage.is_terminal() || age < self.retention
        });
        if jobs.len() < before {
            debug!(pruned = before - jobs.len(), "Dropped finished jobs");
        }
        jobs.insert(
            job.id(),
            Job {
                id: job.id(),
                stage: job.stage(),
                output_path: job.output_path().to_path_buf(),
                progress: 0.0,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.lock().get(&id).cloned()
    }

    pub fn update_job_stage(&self, job: &VideoJob) {
        let stage = job.stage();
        self.update(job.id(), |record| {
            record.stage = stage;
            if stage == JobStage::Done {
                record.progress = 1.0;
            }
        });

        self.emit(JobEvent::StageChanged {
            job_id: job.id(),
            stage,
        });
        if stage == JobStage::Done {
            self.emit(JobEvent::Completed {
                job_id: job.id(),
                output_path: job.output_path().to_path_buf(),
            });
        }
    }

    pub fn update_progress(&self, id: JobId, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        self.update(id, |record| record.progress = progress);
        self.emit(JobEvent::Progress {
            job_id: id,
            progress,
        });
    }

    /// Record a failure. `failed_in` is the stage that was running.
    pub fn fail_job(&self, job: &VideoJob, failed_in: JobStage, message: &str) {
        self.update(job.id(), |record| {
            record.stage = job.stage();
            record.error = Some(message.to_string());
        });
        self.emit(JobEvent::Failed {
            job_id: job.id(),
            stage: failed_in,
            message: message.to_string(),
        });
    }

    /// Fail a job whose runner went away before reaching a terminal stage.
    /// Returns false if the job is unknown or already finished.
    pub fn abandon_job(&self, id: JobId, message: &str) -> bool {
        let failed_in = {
            let mut jobs = self.lock();
            let Some(record) = jobs.get_mut(&id) else {
                return false;
            };
            if record.stage.is_terminal() {
                return false;
            }
            let failed_in = record.stage;
            record.stage = JobStage::Failed;
            record.error = Some(message.to_string());
            record.updated_at = Utc::now();
            failed_in
        };
        self.emit(JobEvent::Failed {
            job_id: id,
            stage: failed_in,
            message: message.to_string(),
        });
        true
    }

    fn update(&self, id: JobId, apply: impl FnOnce(&mut Job)) {
        if let Some(record) = self.lock().get_mut(&id) {
            apply(record);
            record.updated_at = Utc::now();
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
