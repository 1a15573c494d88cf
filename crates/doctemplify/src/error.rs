/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for document assembly and placeholder substitution.
//!
//! Fatal conditions are [`DoctemplifyError`] values. Conditions that should
//! be reported but never change the outcome of an operation are
//! [`SubstitutionWarning`] values, returned alongside a successful result.

use std::fmt;

use thiserror::Error;

use crate::service::{RemoteError, RemoteErrorKind};

/// Errors that abort the requested operation.
#[derive(Debug, Error)]
pub enum DoctemplifyError {
    /// Credentials were rejected or the service could not be initialized.
    #[error("Authentication failed during {operation}: {message}")]
    Auth { operation: String, message: String },

    /// A call to the remote document or file service failed.
    #[error("Remote call '{operation}' failed: {source}")]
    RemoteApi {
        operation: String,
        #[source]
        source: RemoteError,
    },

    /// Placeholders in the document have no counterpart in the data.
    #[error("Missing data for placeholders: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// A data value has a shape that cannot be substituted.
    #[error("Invalid value for placeholder '{placeholder}': {message}")]
    TemplateSyntax { placeholder: String, message: String },

    /// Substitution stopped partway. The first `completed` placeholders
    /// stay replaced in the document.
    #[error("Substitution aborted after {completed} placeholders: {source}")]
    SubstitutionAborted {
        completed: usize,
        #[source]
        source: Box<DoctemplifyError>,
    },

    /// A template description element could not be assembled.
    #[error("Cannot assemble element '{element}': {message}")]
    Assembly { element: String, message: String },

    /// A template description is not a JSON object.
    #[error("Invalid template description: {message}")]
    Description { message: String },

    /// Engine configuration could not be read or parsed.
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl DoctemplifyError {
    /// Create an assembly error for the named element.
    pub fn assembly(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Assembly {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create a template syntax error for the given placeholder expression.
    pub fn template_syntax(placeholder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateSyntax {
            placeholder: placeholder.into(),
            message: message.into(),
        }
    }
}

impl DoctemplifyError {
    /// The error that stopped the operation, looking through
    /// [`DoctemplifyError::SubstitutionAborted`].
    pub fn root_cause(&self) -> &DoctemplifyError {
        match self {
            Self::SubstitutionAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<RemoteError> for DoctemplifyError {
    fn from(err: RemoteError) -> Self {
        match err.kind {
            RemoteErrorKind::Auth => Self::Auth {
                operation: err.operation.clone(),
                message: err.message,
            },
            _ => Self::RemoteApi {
                operation: err.operation.clone(),
                source: err,
            },
        }
    }
}

/// Result type for doctemplify operations.
pub type Result<T> = std::result::Result<T, DoctemplifyError>;

/// Non-fatal conditions reported while assembling or substituting.
#[derive(Debug, Clone, PartialEq)]
pub enum SubstitutionWarning {
    /// The remote replace call matched nothing.
    PlaceholderAbsent { placeholder: String },

    /// The replaced text could not be located again for styling.
    StyleRangeNotFound { placeholder: String, text: String },

    /// An image placeholder was not found in the document text.
    ImageNotFound { placeholder: String },

    /// A style string named a font outside the allow-list.
    UnsupportedFont { font: String },

    /// A style string used a color syntax other than hex or `rgb()`.
    UnrecognizedColor { value: String },

    /// Table content addressed a cell outside the declared geometry.
    CellOutOfBounds {
        element: String,
        row: usize,
        col: usize,
    },
}

impl fmt::Display for SubstitutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionWarning::PlaceholderAbsent { placeholder } => {
                write!(f, "Placeholder {} not found in document", placeholder)
            }
            SubstitutionWarning::StyleRangeNotFound { placeholder, text } => write!(
                f,
                "Could not locate replaced text {:?} for {} to apply style",
                text, placeholder
            ),
            SubstitutionWarning::ImageNotFound { placeholder } => {
                write!(f, "Image placeholder {} not found in document", placeholder)
            }
            SubstitutionWarning::UnsupportedFont { font } => {
                write!(f, "Font '{}' is not available; it will be ignored", font)
            }
            SubstitutionWarning::UnrecognizedColor { value } => {
                write!(f, "Unrecognized color '{}'; using black", value)
            }
            SubstitutionWarning::CellOutOfBounds { element, row, col } => write!(
                f,
                "Table '{}' has no cell at row {}, column {}; content skipped",
                element, row, col
            ),
        }
    }
}

impl SubstitutionWarning {
    /// Emit this warning as a log line.
    pub(crate) fn log(&self) {
        tracing::warn!("{}", self);
    }
}
