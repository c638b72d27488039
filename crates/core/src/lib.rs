//! # hydrorisk core
//!
//! Core types, traits and I/O for the hydrorisk terrain-and-risk engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid snapshot (elevation, flow, masks)
//! - `GeoTransform`: affine pixel-to-map transformation
//! - `CRS`: coordinate reference system identifiers
//! - `Feature` / `FeatureCollection`: vector features with attributes
//! - `Progress`: stage progress reporting
//! - I/O for GeoTIFF rasters and GeoJSON vectors

pub mod crs;
pub mod error;
pub mod io;
pub mod progress;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use progress::Progress;
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::progress::Progress;
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// Common interface for the analysis stages.
///
/// Stages are pure functions of their input and parameters; they never
/// mutate the grids they are handed.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
