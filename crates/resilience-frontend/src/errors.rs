//! Error types for parsing and validation.

use std::fmt;

use thiserror::Error;

/// Semantic validation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationContext {
    Network { network: String },
    Node { node: String },
    Prior { node: String },
}

impl fmt::Display for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { network } => write!(f, "network '{}'", network),
            Self::Node { node } => write!(f, "node '{}'", node),
            Self::Prior { node } => write!(f, "node '{}' prior", node),
        }
    }
}

/// Semantic validation diagnostic with its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDiagnostic {
    pub message: String,
    pub context: Option<ValidationContext>,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error")?;
        if let Some(ctx) = &self.context {
            write!(f, " [{}]", ctx)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Errors that can occur during parsing or validation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FrontendError {
    /// Syntax error during parsing.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Semantic validation error.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Semantic validation error with context.
    #[error("{0}")]
    ValidationDiagnostic(ValidationDiagnostic),
}

impl FrontendError {
    /// Build a context-aware validation diagnostic.
    pub fn validation(message: impl Into<String>, context: Option<ValidationContext>) -> Self {
        Self::ValidationDiagnostic(ValidationDiagnostic {
            message: message.into(),
            context,
        })
    }

    /// Returns the rich validation diagnostic if present.
    pub fn validation_diagnostic(&self) -> Option<&ValidationDiagnostic> {
        match self {
            Self::ValidationDiagnostic(diag) => Some(diag),
            _ => None,
        }
    }
}
