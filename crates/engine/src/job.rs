use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;

/// Unique per-invocation identifier. Every artifact of a job is named after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        JobId::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(JobId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Pending,
    Acquiring,
    Normalizing,
    Composing,
    Done,
    Failed,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }

    /// Stage that follows `self` on the happy path.
    pub fn next(self) -> Option<JobStage> {
        match self {
            JobStage::Pending => Some(JobStage::Acquiring),
            JobStage::Acquiring => Some(JobStage::Normalizing),
            JobStage::Normalizing => Some(JobStage::Composing),
            JobStage::Composing => Some(JobStage::Done),
            JobStage::Done | JobStage::Failed => None,
        }
    }

    pub fn can_transition_to(self, to: JobStage) -> bool {
        match to {
            JobStage::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Pending => "pending",
            JobStage::Acquiring => "acquiring",
            JobStage::Normalizing => "normalizing",
            JobStage::Composing => "composing",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoJob {
    id: JobId,
    output_path: PathBuf,
    stage: JobStage,
}

impl VideoJob {
    /// A pending job whose output is `<output_dir>/<id>.mp4`.
    pub fn new(id: JobId, output_dir: &Path) -> Self {
        VideoJob {
            id,
            output_path: output_path_for(output_dir, id),
            stage: JobStage::Pending,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn advance(&mut self, to: JobStage) -> Result<(), EngineError> {
        if !self.stage.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }
}

pub fn output_path_for(output_dir: &Path, id: JobId) -> PathBuf {
    output_dir.join(format!("{}.mp4", id))
}
