use thiserror::Error;

/// Errors related to workflow graph structure and mutation.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("step '{0}' not found in workflow")]
    StepNotFound(String),

    #[error("step '{step_id}' depends on unknown step '{dependency}'")]
    UnknownDependency { step_id: String, dependency: String },

    #[error("cycle detected involving step '{0}'")]
    CycleDetected(String),

    #[error("step '{step_id}' is terminal ({status}) and cannot transition")]
    TerminalTransition { step_id: String, status: String },
}

/// Errors from checkpoint persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("checkpoint corrupt at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("workflow '{0}' has no checkpoints")]
    NoCheckpoints(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
