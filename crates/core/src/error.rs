//! Error types for hydrorisk

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hydrorisk operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input not found: {0:?}")]
    InputNotFound(PathBuf),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(
        "Cannot snap outlet ({x}, {y}) to the drainage network (accumulation > {threshold}): {}",
        snap_context(.nearest, .max_distance)
    )]
    SnapFailure {
        threshold: f64,
        x: f64,
        y: f64,
        /// Distance to the closest drainage cell, if any exists
        nearest: Option<f64>,
        /// Configured search radius, if any
        max_distance: Option<f64>,
    },

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Invalid attribute '{column}': {reason}")]
    InvalidAttribute { column: String, reason: String },

    #[error("Vector error: {0}")]
    Vector(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

fn snap_context(nearest: &Option<f64>, max_distance: &Option<f64>) -> String {
    match (*nearest, *max_distance) {
        (None, _) => "no drainage cell exists in the grid; lower the threshold".to_string(),
        (Some(d), Some(max)) => format!(
            "nearest drainage cell is {:.2} units away, beyond the search radius of {:.2}; \
             move the point or lower the threshold",
            d, max
        ),
        (Some(d), None) => format!("nearest drainage cell is {:.2} units away", d),
    }
}

impl Error {
    /// Attach the name of the pipeline stage that produced this error.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Vector(e.to_string())
    }
}

/// Result type alias for hydrorisk operations
pub type Result<T> = std::result::Result<T, Error>;
