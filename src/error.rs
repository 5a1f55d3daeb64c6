use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No stages in pipeline
    #[error("cannot build a pipeline with no stages")]
    NoStages,

    /// Stage name could not be resolved to a transform
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    /// Queue capacity must be at least one
    #[error("queue capacity must be at least 1")]
    InvalidCapacity,

    /// Stage was created with an empty name
    #[error("invalid stage name: empty")]
    InvalidName,

    /// The stage's queue refused new work after the finished signal
    #[error("queue is finished and no longer accepts items")]
    QueueFinished,

    /// Operation on a stage whose worker has already been finalized
    #[error("stage '{0}' is not running")]
    NotRunning(String),

    /// attach was called more than once on the same stage
    #[error("stage '{0}' already has a downstream attached")]
    AlreadyAttached(String),

    /// attach was called after the stage consumed the end-of-stream marker
    #[error("stage '{0}' has already finished")]
    AlreadyFinished(String),

    /// The worker thread could not be spawned
    #[error("failed to start worker thread: {0}")]
    ThreadStartFailed(#[from] std::io::Error),

    /// Joining the worker thread failed (the worker panicked)
    #[error("worker thread of stage '{0}' panicked")]
    WorkerPanicked(String),

    /// fini was invoked from the stage's own worker thread
    #[error("stage '{0}' cannot be finalized from its own worker thread")]
    CannotJoinSelf(String),

    /// A transform rejected an item
    #[error("transform failed: {0}")]
    TransformFailed(String),
}
