//! End-to-end stages reading inputs from disk and writing named artifacts
//!
//! | stage | artifacts |
//! |-------|-----------|
//! | [`run_preprocessing`] | `flow_direction.tif`, `flow_accumulation.tif`, `slope.tif`, `aspect.tif`, `twi.tif`, `drainage_network.geojson` |
//! | [`run_delineation`] | `outlet.geojson`, `catchment.geojson`, `stream_network_strahler.geojson`, `flow_distance.tif`, `inundation_depth_<depth>.tif`, `inundation_<depth>.geojson` |
//! | [`run_soil_intersection`] | `soil_segmented.geojson` |
//! | [`run_proportional_buffer`] | `soil_buffered.geojson` |
//!
//! A failing stage writes none of its own artifacts; files from earlier
//! stages stay on disk.

mod delineation;
mod preprocess;
mod soil;

pub use delineation::{delineate_catchment, run_delineation, Delineation, DelineationOutputs, DelineationParams};
pub use preprocess::{preprocess, run_preprocessing, PreprocessOutputs, PreprocessParams, Preprocessed};
pub use soil::{run_proportional_buffer, run_soil_intersection};
