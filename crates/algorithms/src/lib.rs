//! # hydrorisk algorithms
//!
//! Analysis stages for the hydrorisk terrain-and-risk engine.
//!
//! ## Stage Categories
//!
//! - **hydrology**: DEM conditioning, D8 flow, delineation, stream network, HAND
//! - **terrain**: Slope, aspect, topographic wetness index
//! - **vector**: Polygonize, overlay, buffer, equal-area projection
//! - **numeric**: Bracketed root finding
//! - **risk**: Soil-class segmentation and proportional-area buffering
//! - **pipeline**: File-level stages writing the named artifacts

pub mod hydrology;
pub mod numeric;
pub mod pipeline;
pub mod risk;
pub mod terrain;
pub mod vector;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        condition_dem, delineate, flow_accumulation, flow_direction, hand, inundation_depth, snap,
        stream_order, threshold, ConditionDem, Delineate, FillDepressions, FlowDirection, Outlet,
    };
    pub use crate::pipeline::{
        run_delineation, run_preprocessing, run_proportional_buffer, run_soil_intersection,
        DelineationParams, PreprocessParams,
    };
    pub use crate::risk::{
        proportional_buffer, soil_intersection, BufferSummary, ProportionalBufferParams,
        SoilIntersectionParams, WeightMapping,
    };
    pub use crate::terrain::{aspect, slope, twi, Aspect, Slope};
    pub use hydrorisk_core::prelude::*;
}
