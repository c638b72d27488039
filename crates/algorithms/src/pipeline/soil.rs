//! File-level soil stages: segmentation by soil class, then proportional buffering

use crate::risk::{
    proportional_buffer, soil_intersection, BufferSummary, ProportionalBufferParams, SoilIntersectionParams,
    WeightMapping,
};
use hydrorisk_core::io::{read_geotiff, read_vector, write_geojson};
use hydrorisk_core::{Progress, Raster, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Segment a vector layer by the classes of a soil raster.
///
/// `vector_path` may be a GeoJSON file or a `.zip` holding one. Writes
/// `soil_segmented.geojson` into `output_dir`.
pub fn run_soil_intersection(
    raster_path: &Path,
    vector_path: &Path,
    output_dir: &Path,
    params: &SoilIntersectionParams,
    progress: &mut Progress,
) -> Result<PathBuf> {
    progress.report("Reading inputs", 5);
    let soil: Raster<f64> = read_geotiff(raster_path)?;
    let layer = read_vector(vector_path)?;
    info!("Read {} features from {}", layer.len(), vector_path.display());

    let segmented = soil_intersection(&layer, &soil, params, progress).map_err(|e| e.in_stage("soil intersection"))?;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("soil_segmented.geojson");
    write_geojson(&segmented, &path)?;
    info!("Wrote {} segmented features to {}", segmented.len(), path.display());
    Ok(path)
}

/// Buffer a segmented layer by class percentage.
///
/// Writes `soil_buffered.geojson` into `output_dir`.
pub fn run_proportional_buffer(
    vector_path: &Path,
    weights: &WeightMapping,
    params: &ProportionalBufferParams,
    output_dir: &Path,
    progress: &mut Progress,
) -> Result<(PathBuf, BufferSummary)> {
    let layer = read_vector(vector_path)?;
    info!("Read {} features from {}", layer.len(), vector_path.display());

    let (buffered, summary) =
        proportional_buffer(&layer, weights, params, progress).map_err(|e| e.in_stage("proportional buffer"))?;

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("soil_buffered.geojson");
    write_geojson(&buffered, &path)?;
    Ok((path, summary))
}
