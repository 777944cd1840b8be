//! Error types for the windowing pipeline.
//!
//! Every variant below the directory scan is recoverable: the dataset loader
//! records it against the offending file and moves on to the next one.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing required columns: {}", missing.join(", "))]
    SchemaValidation { missing: Vec<String> },

    #[error("signal too short for zero-phase filtering: need {required} samples, have {available}")]
    SignalTooShort { required: usize, available: usize },

    #[error("unknown label {value:?} at row {row}")]
    UnknownLabel { value: String, row: usize },

    #[error("malformed value {value:?} in column {column} at row {row}")]
    MalformedRecord {
        column: String,
        row: usize,
        value: String,
    },

    #[error("unsupported table format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
