//! Error types for spatial reference handling.

use thiserror::Error;

/// Result type for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors raised while parsing, building or applying a spatial reference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The WKT text could not be parsed.
    #[error("Invalid WKT at offset {offset}: {message}")]
    InvalidWkt { offset: usize, message: String },

    /// The spatial reference is missing a required element.
    #[error("Incomplete spatial reference: {0}")]
    Incomplete(String),

    /// No forward/inverse math is available for this projection method.
    #[error("Unsupported projection method: {0}")]
    UnsupportedMethod(String),

    /// Invalid projection parameter value.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter { name: String, value: f64 },
}

impl ProjectionError {
    pub(crate) fn wkt(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidWkt {
            offset,
            message: message.into(),
        }
    }
}
