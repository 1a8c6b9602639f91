//! Error kinds for the three capabilities.
//!
//! Each capability returns its own error type so callers can tell bad data
//! from bad configuration from a bad reference. [`Error`] wraps all of them
//! for scripts that chain several calls with `?`.

use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::DType;

/// Structurally inconsistent or unparseable input data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}', row {row}: cannot coerce '{value}' to {dtype}")]
    Unparseable {
        column: String,
        row: usize,
        value: String,
        dtype: DType,
    },

    #[error("column '{column}' is {dtype}, expected text")]
    NotText { column: String, dtype: DType },
}

/// Failure while computing an annotation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has type {dtype}, which {operation} does not accept")]
    IncompatibleType {
        column: String,
        dtype: DType,
        operation: String,
    },

    #[error("annotation '{0}' already exists (set overwrite to replace it)")]
    NameConflict(String),

    #[error("inconsistent dataset: {0}")]
    InconsistentShape(#[source] ValidationError),

    #[error("integer overflow while computing {0}")]
    Overflow(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// An invalid mutation of a [`PlotSpec`](crate::plotting::PlotSpec).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("{axis} axis '{column}' has type {dtype}, which a {kind} plot cannot use")]
    IncompatibleAxis {
        axis: &'static str,
        column: String,
        dtype: DType,
        kind: String,
    },

    #[error("a {0} plot needs a y axis")]
    MissingAxis(String),

    #[error("a {0} plot does not take a y axis")]
    AxisNotApplicable(String),

    #[error("colour column '{0}' has mixed types")]
    MixedColumn(String),

    #[error("invalid style: {0}")]
    InvalidStyle(String),

    #[error("unsupported output format for '{0}' (expected .png)")]
    UnsupportedFormat(PathBuf),
}

/// A valid configuration that cannot be rendered against the given data.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("column '{0}' referenced by the plot is missing from the dataset")]
    MissingColumn(String),

    #[error("column '{column}' is now {actual}, the plot was configured for {expected}")]
    TypeMismatch {
        column: String,
        expected: DType,
        actual: DType,
    },

    #[error("inconsistent dataset: {0}")]
    InconsistentShape(#[source] ValidationError),

    #[error("writing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Which family an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Computation,
    Configuration,
    Render,
}

/// Any error produced by the toolkit.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Computation(#[from] ComputationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Computation(_) => ErrorKind::Computation,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Render(_) => ErrorKind::Render,
        }
    }
}

/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_the_wrapped_error() {
        let err: Error = ValidationError::DuplicateColumn("id".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: Error = ConfigurationError::UnknownColumn("dose".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "unknown column 'dose'");
    }

    #[test]
    fn shape_errors_keep_their_source() {
        let err = ComputationError::InconsistentShape(ValidationError::LengthMismatch {
            column: "b".into(),
            expected: 2,
            actual: 3,
        });
        assert!(std::error::Error::source(&err).is_some());
    }
}
