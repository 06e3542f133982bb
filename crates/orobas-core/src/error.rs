//! Error types for the Orobas façade.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of handle an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A model handle.
    Model,
    /// A context handle derived from a model.
    Context,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Context => write!(f, "context"),
        }
    }
}

/// Unified error type for the Orobas façade.
#[derive(Error, Debug)]
pub enum Error {
    /// The engine rejected the model file (missing, corrupt, incompatible).
    ///
    /// Recoverable by retrying `load` with a corrected path.
    #[error("Failed to load model: {message}")]
    ModelLoad {
        /// Diagnostic from the engine, surfaced verbatim.
        message: String,
    },

    /// The engine could not allocate a model or context resource.
    ///
    /// Fatal for the handle; discard it and retry creation.
    #[error("Engine initialization failed: {message}")]
    EngineInit {
        /// Error message.
        message: String,
    },

    /// An operation was invoked on a context with the wrong mode.
    #[error("Invalid context mode: {message}")]
    Mode {
        /// Which mode the operation requires.
        message: String,
    },

    /// An operation requiring a loaded model was invoked before `load`.
    #[error("Model not loaded: {operation} requires a loaded model")]
    NotLoaded {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// An operation was invoked on a destroyed handle.
    #[error("{handle} handle destroyed: cannot {operation}")]
    HandleDestroyed {
        /// Which kind of handle was destroyed.
        handle: HandleKind,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A live context already exists on this model.
    ///
    /// Destroy it first, or request it back with the `existing` option.
    #[error("Context already exists: destroy it or request it with `existing`")]
    ContextExists,

    /// Engine-specific failure during an operation.
    #[error("Engine error during {operation}: {message}")]
    Engine {
        /// The operation that failed.
        operation: &'static str,
        /// Error message from the engine.
        message: String,
    },
}

impl Error {
    /// Creates a model load error carrying the engine diagnostic.
    #[must_use]
    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad {
            message: message.into(),
        }
    }

    /// Creates an engine initialization error.
    #[must_use]
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::EngineInit {
            message: message.into(),
        }
    }

    /// Creates a mode mismatch error.
    #[must_use]
    pub fn mode(message: impl Into<String>) -> Self {
        Self::Mode {
            message: message.into(),
        }
    }

    /// Creates a not-loaded lifecycle error.
    #[must_use]
    pub fn not_loaded(operation: &'static str) -> Self {
        Self::NotLoaded { operation }
    }

    /// Creates a destroyed-handle lifecycle error.
    #[must_use]
    pub fn destroyed(handle: HandleKind, operation: &'static str) -> Self {
        Self::HandleDestroyed { handle, operation }
    }

    /// Creates a generic engine error.
    #[must_use]
    pub fn engine(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Engine {
            operation,
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a caller programming error against the
    /// handle lifecycle rather than an engine failure.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Mode { .. }
                | Self::NotLoaded { .. }
                | Self::HandleDestroyed { .. }
                | Self::ContextExists
        )
    }

    /// Returns `true` if retrying the failed operation can succeed.
    ///
    /// Only `load` with a corrected path is retryable; the façade itself
    /// never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelLoad { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_load_surfaces_engine_diagnostic() {
        let err = Error::model_load("no such file: nope.gguf");
        assert!(err.to_string().contains("Failed to load model"));
        assert!(err.to_string().contains("nope.gguf"));
        assert!(err.is_retryable());
    }

    #[test]
    fn lifecycle_errors_are_not_retryable() {
        let err = Error::destroyed(HandleKind::Model, "tokenize");
        assert!(err.is_lifecycle());
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "model handle destroyed: cannot tokenize"
        );
    }

    #[test]
    fn mode_error_names_required_mode() {
        let err = Error::mode("embedding context required");
        assert!(err.to_string().contains("embedding context required"));
        assert!(err.is_lifecycle());
    }
}
