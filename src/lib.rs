//! Preprocessing, annotation and plotting for tabular drug datasets.
//!
//! ```text
//!  file ──loader──▶ Dataset ──basic_preproc──▶ normalised Dataset
//!                                                   │
//!                                      basic_tool ◀─┤─▶ basic_plot(PlotSpec)
//!                                   (annotations)       (Figure / PNG)
//! ```
//!
//! Each stage reports failures with its own error type; [`Error`] unifies
//! them for callers that chain stages with `?`.

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod plotting;
pub mod preprocessing;
pub mod tools;

pub use data::model::{Annotation, Column, DType, Dataset, GroupedValues, Scalar, Schema};
pub use error::{
    ComputationError, ConfigurationError, Error, ErrorKind, RenderError, Result, ValidationError,
};
pub use plotting::{basic_plot, Figure, OutputTarget, PlotKind, PlotSpec, Style};
pub use preprocessing::{basic_preproc, explode, MalformedPolicy, PreprocOptions};
pub use tools::{basic_tool, find_matches, MatchOptions, Metric, ToolOptions};
