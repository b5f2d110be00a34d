//! Error types for netCDF raster operations.

use projection::ProjectionError;
use thiserror::Error;

use crate::store::StoreError;

/// Result type for netCDF raster operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for netCDF raster access.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// Failure reported by the underlying array store
    #[error("Array store error: {0}")]
    Store(#[from] StoreError),

    /// Container cannot be interpreted as a netCDF raster
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Requested variable is absent
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Raster access requested on a variable with fewer than two dimensions
    #[error("Variable {0} has fewer than 2 dimensions")]
    TooFewDimensions(String),

    /// A dimension spanned by the raster has length 0
    #[error("Dimension {0} has zero length")]
    ZeroLengthDimension(String),

    /// Existing containers are read-only
    #[error("Update access to an existing container is not supported")]
    UpdateNotSupported,

    /// Requested operation is outside what the driver can do
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Operation is invalid in the dataset's current state
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Band, block or index outside the valid range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Progress callback requested termination
    #[error("Operation aborted by user")]
    Aborted,

    /// Spatial reference failure
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
