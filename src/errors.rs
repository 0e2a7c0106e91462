//! Centralized error handling for bl_diag
//!
//! This module provides structured error types used across the crate, enabling
//! better error context and type safety than a generic `Box<dyn Error>`.
//!
//! Per-time-step detection failures are NOT errors: a step with no detectable
//! boundary is recovered into a sentinel height with a cleared `found` flag so
//! a batch never aborts mid-series. The variants here cover configuration and
//! setup failures, which are fatal and surfaced immediately.

use std::fmt;

/// Main error type for bl_diag operations
#[derive(Debug)]
pub enum BlDiagError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// Staggered component arrays disagree in shape, even after the
    /// alternate-identifier retry
    ShapeMismatch {
        var: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Variable not found in the data source
    VariableNotFound { var: String },

    /// Unknown boundary-detection method name
    InvalidMethod { method: String },

    /// Profile is empty or contains no finite samples
    DegenerateProfile { message: String },

    /// Invalid domain sub-range specification
    InvalidSlice { message: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Generic error for anything else
    Generic(String),
}

impl fmt::Display for BlDiagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlDiagError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            BlDiagError::ShapeMismatch {
                var,
                expected,
                found,
            } => write!(
                f,
                "Shape mismatch for variable '{}': expected {:?}, found {:?}",
                var, expected, found
            ),
            BlDiagError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            BlDiagError::InvalidMethod { method } => {
                write!(f, "Unknown boundary-detection method '{}'", method)
            }
            BlDiagError::DegenerateProfile { message } => {
                write!(f, "Degenerate profile: {}", message)
            }
            BlDiagError::InvalidSlice { message } => {
                write!(f, "Invalid domain range: {}", message)
            }
            BlDiagError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            BlDiagError::ArrayError(e) => write!(f, "Array error: {}", e),
            BlDiagError::IoError(e) => write!(f, "I/O error: {}", e),
            BlDiagError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BlDiagError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlDiagError::NetCDFError(e) => Some(e),
            BlDiagError::IoError(e) => Some(e),
            BlDiagError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for BlDiagError {
    fn from(error: netcdf::Error) -> Self {
        BlDiagError::NetCDFError(error)
    }
}

impl From<std::io::Error> for BlDiagError {
    fn from(error: std::io::Error) -> Self {
        BlDiagError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for BlDiagError {
    fn from(error: ndarray::ShapeError) -> Self {
        BlDiagError::ArrayError(error)
    }
}

impl From<String> for BlDiagError {
    fn from(error: String) -> Self {
        BlDiagError::Generic(error)
    }
}

impl From<&str> for BlDiagError {
    fn from(error: &str) -> Self {
        BlDiagError::Generic(error.to_string())
    }
}

/// Result type alias for bl_diag operations
pub type Result<T> = std::result::Result<T, BlDiagError>;
