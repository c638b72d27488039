//! DEM preprocessing: conditioning, flow field, terrain derivatives and
//! the full-extent drainage network

use crate::hydrology::{
    condition_dem, extract_network, flow_accumulation, flow_direction, threshold, ConditionParams, DrainageMask,
};
use crate::terrain::{aspect, slope, twi};
use geo::LineString;
use hydrorisk_core::io::{read_geotiff, write_geojson, write_geotiff};
use hydrorisk_core::{Error, Feature, FeatureCollection, Progress, Raster, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Parameters for [`preprocess`]
#[derive(Debug, Clone)]
pub struct PreprocessParams {
    /// Flow accumulation (cells) above which a cell is drainage
    pub stream_threshold: f64,
    pub condition: ConditionParams,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            stream_threshold: 1000.0,
            condition: ConditionParams::default(),
        }
    }
}

/// In-memory products of preprocessing, reused by delineation
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Conditioned DEM
    pub dem: Raster<f64>,
    pub flow_dir: Raster<u8>,
    pub accumulation: Raster<f64>,
    /// Slope in degrees
    pub slope: Raster<f64>,
    pub aspect: Raster<f64>,
    pub twi: Raster<f64>,
    pub drainage: DrainageMask,
    /// Full-extent drainage network
    pub network: Vec<LineString<f64>>,
}

/// Files written by [`run_preprocessing`]
#[derive(Debug, Clone)]
pub struct PreprocessOutputs {
    pub flow_direction: PathBuf,
    pub flow_accumulation: PathBuf,
    pub slope: PathBuf,
    pub aspect: PathBuf,
    pub twi: PathBuf,
    /// Absent when the threshold leaves no reach of two or more vertices
    pub drainage_network: Option<PathBuf>,
}

/// Condition `dem` and derive its flow field and terrain products
pub fn preprocess(dem: &Raster<f64>, params: &PreprocessParams, progress: &mut Progress) -> Result<Preprocessed> {
    if !params.stream_threshold.is_finite() || params.stream_threshold < 0.0 {
        return Err(Error::InvalidParameter {
            name: "stream_threshold",
            value: params.stream_threshold.to_string(),
            reason: "must be a non-negative number of cells".into(),
        });
    }

    progress.report("Conditioning DEM (pits, depressions, flats)", 15);
    let conditioned = condition_dem(dem, params.condition.clone()).map_err(|e| e.in_stage("conditioning"))?;

    progress.report("Computing flow direction and accumulation", 30);
    let flow_dir = flow_direction(&conditioned).map_err(|e| e.in_stage("flow direction"))?;
    let accumulation =
        flow_accumulation(&flow_dir, &conditioned).map_err(|e| e.in_stage("flow accumulation"))?;

    progress.report("Computing aspect", 45);
    let aspect = aspect(&conditioned).map_err(|e| e.in_stage("aspect"))?;

    progress.report("Computing slope", 50);
    let slope = slope(&conditioned).map_err(|e| e.in_stage("slope"))?;

    progress.report("Computing topographic wetness index", 60);
    let twi = twi(&accumulation, &slope).map_err(|e| e.in_stage("twi"))?;

    progress.report("Vectorizing drainage network", 75);
    let drainage = threshold(&accumulation, params.stream_threshold);
    let network = extract_network(&flow_dir, &drainage.cells).map_err(|e| e.in_stage("drainage network"))?;
    info!(
        "{} drainage cells above {} form {} reaches",
        drainage.count(),
        params.stream_threshold,
        network.len()
    );

    Ok(Preprocessed {
        dem: conditioned,
        flow_dir,
        accumulation,
        slope,
        aspect,
        twi,
        drainage,
        network,
    })
}

impl Preprocessed {
    /// Write every preprocessing product into `dir`
    pub fn write_outputs(&self, dir: &Path) -> Result<PreprocessOutputs> {
        let raster = |name: &str, r: &Raster<f64>| -> Result<PathBuf> {
            let path = dir.join(name);
            write_geotiff(r, &path)?;
            Ok(path)
        };
        let flow_direction = dir.join("flow_direction.tif");
        write_geotiff(&self.flow_dir, &flow_direction)?;

        let drainage_network = if self.network.is_empty() {
            None
        } else {
            let mut fc = FeatureCollection::with_crs(self.dem.crs().cloned());
            for line in &self.network {
                fc.push(Feature::new(line.clone()));
            }
            let path = dir.join("drainage_network.geojson");
            write_geojson(&fc, &path)?;
            Some(path)
        };

        Ok(PreprocessOutputs {
            flow_direction,
            flow_accumulation: raster("flow_accumulation.tif", &self.accumulation)?,
            slope: raster("slope.tif", &self.slope)?,
            aspect: raster("aspect.tif", &self.aspect)?,
            twi: raster("twi.tif", &self.twi)?,
            drainage_network,
        })
    }
}

/// Read a DEM, preprocess it and write the products into `output_dir`
pub fn run_preprocessing(
    dem_path: &Path,
    output_dir: &Path,
    params: &PreprocessParams,
    progress: &mut Progress,
) -> Result<(Preprocessed, PreprocessOutputs)> {
    progress.report("Loading DEM", 5);
    let dem: Raster<f64> = read_geotiff(dem_path)?;
    let (rows, cols) = dem.shape();
    info!("Loaded {}x{} DEM from {}", cols, rows, dem_path.display());

    let pre = preprocess(&dem, params, progress)?;

    progress.report("Saving preprocessing rasters", 90);
    std::fs::create_dir_all(output_dir)?;
    let outputs = pre.write_outputs(output_dir)?;
    progress.report("Preprocessing complete", 100);
    Ok((pre, outputs))
}
