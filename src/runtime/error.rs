use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Scheduling loop crashed: {0}")]
    LoopCrashed(String),

    #[error("Scheduling loop did not stop within {0:?}")]
    ShutdownTimedOut(Duration),
}
