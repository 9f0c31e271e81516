//! Errors of the one-shot helpers.

use thiserror::Error;
use tileblas::{BlasError, DatabaseError};

/// Errors that can occur in the convenience functions of this crate.
#[derive(Debug, Error)]
pub enum HostError {
    /// The tuning file named by the environment could not be loaded.
    #[error("Tuning database error: {0}")]
    Database(#[from] DatabaseError),

    /// A routine failed.
    #[error(transparent)]
    Blas(#[from] BlasError),

    /// Host slices do not match the requested shape.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Result type for the convenience functions.
pub type Result<T> = std::result::Result<T, HostError>;
