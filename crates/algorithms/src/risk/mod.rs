//! Soil-weighted buffer risk model
//!
//! - [`soil_intersection`]: split a polygon layer along soil-class regions
//! - [`proportional_buffer`]: grow or shrink features by class percentage
//! - [`WeightMapping`]: validated class → percentage table

mod buffer;
mod intersection;
mod weights;

pub use buffer::{proportional_buffer, BufferSummary, ProportionalBufferParams};
pub use intersection::{soil_intersection, SoilIntersectionParams};
pub use weights::WeightMapping;
