//! Error types for the runner.
//!
//! These are engine-level failures only. Anything caused by the submission
//! or the exercise is reported inside a `Verdict`, never as an error.

/// Errors produced by the runner itself.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("invalid engine limits: {0}")]
    InvalidLimits(String),

    #[error("engine setup failed: {0}")]
    EngineSetup(String),

    #[error("validator worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result type for runner operations.
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
