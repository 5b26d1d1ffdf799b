use thiserror::Error;

use crate::job::JobStage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("expected {expected} assets, got {actual}")]
    AssetCount { expected: usize, actual: usize },

    #[error("asset at position {position} has sequence index {index}")]
    AssetOrder { position: usize, index: usize },

    #[error("invalid job transition {from} -> {to}")]
    InvalidTransition { from: JobStage, to: JobStage },
}
