//! Error types for the resilience engine.

use thiserror::Error;

impl From<resilience_frontend::FrontendError> for ResilienceError {
    fn from(err: resilience_frontend::FrontendError) -> Self {
        match err {
            resilience_frontend::FrontendError::ParseError(msg) => ResilienceError::ParseError(msg),
            resilience_frontend::FrontendError::ValidationError(msg) => {
                ResilienceError::ValidationError(msg)
            }
            resilience_frontend::FrontendError::ValidationDiagnostic(diag) => {
                ResilienceError::ValidationError(diag.to_string())
            }
            _ => ResilienceError::Internal(format!("unexpected frontend error: {:?}", err)),
        }
    }
}

/// Errors that abort an operation.
///
/// Recoverable data problems (missing samples, malformed elicitation rows,
/// rejected evidence) are reported as
/// [`Diagnostic`](crate::engine::diagnostics::Diagnostic) values instead, so
/// the pipeline can always produce a result.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Syntax error in a network definition.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Semantic validation error (network definition, config, tables).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A node name that the network does not contain.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// Posterior requested before any inference pass.
    #[error("no inference has been run yet")]
    NoInference,

    /// The inference engine rejected the evidence or the network.
    #[error("inference error: {0}")]
    Inference(String),

    /// Numerical stability error (NaN/Inf, invalid probabilities).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Reading or writing an artifact, table, or log failed.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed artifact, table, or config contents.
    #[error("format error: {0}")]
    Format(String),

    /// Persisted artifact written by an incompatible format version.
    #[error("artifact format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Internal error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResilienceError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
