//! User-facing failure taxonomy.
//!
//! Adapters report failures with `anyhow`; the query paths classify them
//! into an [`EngineError`] so callers get a short message plus a stable,
//! machine-readable code. Scope rejection is not an error and has no
//! variant here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool {tool} failed: {message}")]
    ToolExecutionFailure { tool: String, message: String },

    #[error("model invocation failed: {0}")]
    ModelInvocationFailure(String),

    #[error("stopped after reaching the limit of {0} iterations")]
    MaxIterationsExceeded(usize),

    #[error("request was cancelled")]
    Cancelled,

    #[error("persistence failed: {0}")]
    PersistenceFailure(String),
}

impl EngineError {
    /// Stable code reported alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::RetrievalFailure(_) => "RETRIEVAL_FAILURE",
            EngineError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            EngineError::ToolExecutionFailure { .. } => "TOOL_EXECUTION_FAILURE",
            EngineError::ModelInvocationFailure(_) => "MODEL_INVOCATION_FAILURE",
            EngineError::MaxIterationsExceeded(_) => "MAX_ITERATIONS_REACHED",
            EngineError::Cancelled => "CANCELLED",
            EngineError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Flatten an `anyhow` chain into a single-line message (no backtrace).
    pub fn describe(err: &anyhow::Error) -> String {
        err.chain()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(": ")
    }
}
