//! ASH-002: Engine error taxonomy.

use thiserror::Error;

/// Errors raised by the normalizer, registry, injector and executor.
///
/// Format errors make one recipe unusable; the execution-time variants abort
/// only the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("format error in {origin}: {message}")]
    Format { origin: String, message: String },

    #[error("step {step_index}: function '{function}' not found")]
    MissingCallable { step_index: usize, function: String },

    #[error("step {step_index}: cannot resolve parameter '{parameter}' of '{function}'")]
    UnresolvedParameter {
        step_index: usize,
        function: String,
        parameter: String,
    },

    #[error("capability error: {0}")]
    Capability(String),

    #[error("invalid function descriptor: {0}")]
    Registration(String),

    #[error("input closed")]
    InputClosed,

    #[error("I/O error: {0}")]
    Io(String),
}

impl EngineError {
    /// Format error for a document identified by `origin`.
    pub fn format(origin: &str, message: impl Into<String>) -> Self {
        Self::Format {
            origin: origin.to_string(),
            message: message.into(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
