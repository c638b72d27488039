//! Catchment delineation and HAND inundation for one outlet

use super::preprocess::Preprocessed;
use crate::hydrology::{
    assign_orders, delineate, depth_suffix, extract_network, flow_accumulation, flow_distance, hand,
    inundation_depth, inundation_mask, snap, stream_order, threshold, CatchmentWindow, Outlet, SnapParams,
    StreamReach,
};
use crate::vector::{polygonize_mask, simplest_geometry};
use geo::{MultiPolygon, Point};
use hydrorisk_core::io::{write_geojson, write_geotiff};
use hydrorisk_core::{Error, Feature, FeatureCollection, Progress, Raster, Result, CRS};
use std::path::{Path, PathBuf};
use tracing::info;

/// Parameters for [`delineate_catchment`]
#[derive(Debug, Clone)]
pub struct DelineationParams {
    /// Requested outlet, in the DEM's CRS
    pub outlet_x: f64,
    pub outlet_y: f64,
    /// Water level above the drainage network, in metres
    pub channel_depth: f64,
    pub stream_threshold: f64,
    pub snap: SnapParams,
    /// Also compute the along-flow distance to the outlet
    pub flow_distance: bool,
}

/// Products of one delineation run, clipped to the catchment window
#[derive(Debug, Clone)]
pub struct Delineation {
    pub outlet: Outlet,
    /// Catchment mask (`1` inside) over the clipped window
    pub catchment: Raster<u8>,
    pub catchment_polygon: MultiPolygon<f64>,
    pub reaches: Vec<StreamReach>,
    pub flow_distance: Option<Raster<f64>>,
    /// Water depth where HAND is below the channel depth, NaN elsewhere
    pub inundation_depth: Raster<f64>,
    pub inundation: MultiPolygon<f64>,
    /// File-name suffix derived from the channel depth (`10m`, `2_5m`)
    pub suffix: String,
}

/// Files written by [`Delineation::write_outputs`]
#[derive(Debug, Clone)]
pub struct DelineationOutputs {
    pub outlet: PathBuf,
    pub catchment: PathBuf,
    pub stream_network: Option<PathBuf>,
    pub flow_distance: Option<PathBuf>,
    pub inundation_depth: PathBuf,
    pub inundation: Option<PathBuf>,
}

/// Snap the outlet, delineate its catchment and simulate inundation.
///
/// Stream order and network come from accumulation recomputed inside the
/// catchment; HAND uses the full-extent drainage network and is clipped
/// afterwards.
pub fn delineate_catchment(
    pre: &Preprocessed,
    params: &DelineationParams,
    progress: &mut Progress,
) -> Result<Delineation> {
    if !(params.channel_depth.is_finite() && params.channel_depth > 0.0) {
        return Err(Error::InvalidParameter {
            name: "channel_depth",
            value: params.channel_depth.to_string(),
            reason: "must be a positive number of metres".into(),
        });
    }

    progress.report("Snapping outlet to the drainage network", 10);
    let drainage = threshold(&pre.accumulation, params.stream_threshold);
    let outlet = snap(
        params.outlet_x,
        params.outlet_y,
        &drainage,
        &pre.accumulation,
        params.snap.clone(),
    )
    .map_err(|e| e.in_stage("outlet snapping"))?;
    info!(
        "Outlet snapped to ({:.2}, {:.2}), {:.2} units away, accumulation {}",
        outlet.x, outlet.y, outlet.distance, outlet.accumulation
    );

    progress.report("Delineating catchment", 20);
    let catchment = delineate(&outlet, &pre.flow_dir).map_err(|e| e.in_stage("delineation"))?;

    let distance = if params.flow_distance {
        progress.report("Computing flow distance", 30);
        Some(flow_distance(&pre.flow_dir, &outlet).map_err(|e| e.in_stage("flow distance"))?)
    } else {
        None
    };

    progress.report("Clipping grids to the catchment", 40);
    let window = CatchmentWindow::new(&catchment).map_err(|e| e.in_stage("delineation"))?;
    let flow_distance = distance.map(|d| window.clip(&d)).transpose()?;

    progress.report("Extracting stream network and Strahler order", 50);
    let fdir_clipped = window.clip(&pre.flow_dir)?;
    let dem_clipped = window.clip(&pre.dem)?;
    let reaches = catchment_network(&fdir_clipped, &dem_clipped, params.stream_threshold)
        .map_err(|e| e.in_stage("stream network"))?;

    progress.report("Vectorizing catchment", 60);
    let catchment_polygon = polygonize_mask(window.mask());
    if catchment_polygon.0.is_empty() {
        return Err(Error::EmptyResult("catchment polygons".into()).in_stage("delineation"));
    }
    info!(
        "Catchment of {} cells, {} stream reaches",
        window.mask().data().iter().filter(|&&v| v == 1).count(),
        reaches.len()
    );

    progress.report("Computing HAND", 80);
    let hand_global = hand(&pre.dem, &pre.flow_dir, &drainage.cells).map_err(|e| e.in_stage("hand"))?;
    let hand_clipped = window.clip(&hand_global)?;

    progress.report(&format!("Computing inundation for {} m", params.channel_depth), 90);
    let depth = inundation_depth(&hand_clipped, params.channel_depth).map_err(|e| e.in_stage("inundation"))?;

    progress.report("Vectorizing inundation", 95);
    let inundation = polygonize_mask(&inundation_mask(&depth));

    Ok(Delineation {
        outlet,
        catchment: window.mask().clone(),
        catchment_polygon,
        reaches,
        flow_distance,
        inundation_depth: depth,
        inundation,
        suffix: depth_suffix(params.channel_depth),
    })
}

/// Ordered reaches of the network inside a clipped catchment
fn catchment_network(flow_dir: &Raster<u8>, dem: &Raster<f64>, stream_threshold: f64) -> Result<Vec<StreamReach>> {
    let acc = flow_accumulation(flow_dir, dem)?;
    let mask = threshold(&acc, stream_threshold).cells;
    let order = stream_order(flow_dir, &mask)?;
    let lines = extract_network(flow_dir, &mask)?;
    Ok(assign_orders(lines, &order))
}

impl Delineation {
    /// Write every delineation product into `dir`
    pub fn write_outputs(&self, dir: &Path, crs: Option<&CRS>) -> Result<DelineationOutputs> {
        let layer = |features: Vec<Feature>, name: &str| -> Result<PathBuf> {
            let mut fc = FeatureCollection::with_crs(crs.cloned());
            features.into_iter().for_each(|f| fc.push(f));
            let path = dir.join(name);
            write_geojson(&fc, &path)?;
            Ok(path)
        };

        let outlet = layer(
            vec![Feature::new(Point::new(self.outlet.x, self.outlet.y))
                .with_property("accumulation", self.outlet.accumulation)
                .with_property("snap_distance", self.outlet.distance)],
            "outlet.geojson",
        )?;
        let catchment = layer(
            vec![Feature::new(simplest_geometry(self.catchment_polygon.clone()))],
            "catchment.geojson",
        )?;

        let stream_network = if self.reaches.is_empty() {
            None
        } else {
            let features = self
                .reaches
                .iter()
                .map(|r| Feature::new(r.geometry.clone()).with_property("strahler_order", r.order))
                .collect();
            Some(layer(features, "stream_network_strahler.geojson")?)
        };

        let flow_distance = match &self.flow_distance {
            Some(d) => {
                let path = dir.join("flow_distance.tif");
                write_geotiff(d, &path)?;
                Some(path)
            }
            None => None,
        };

        let inundation_depth = dir.join(format!("inundation_depth_{}.tif", self.suffix));
        write_geotiff(&self.inundation_depth, &inundation_depth)?;

        let inundation = if self.inundation.0.is_empty() {
            None
        } else {
            Some(layer(
                vec![Feature::new(simplest_geometry(self.inundation.clone()))],
                &format!("inundation_{}.geojson", self.suffix),
            )?)
        };

        Ok(DelineationOutputs {
            outlet,
            catchment,
            stream_network,
            flow_distance,
            inundation_depth,
            inundation,
        })
    }
}

/// Delineate from preprocessed grids and write the products into `output_dir`
pub fn run_delineation(
    pre: &Preprocessed,
    params: &DelineationParams,
    output_dir: &Path,
    progress: &mut Progress,
) -> Result<(Delineation, DelineationOutputs)> {
    let result = delineate_catchment(pre, params, progress)?;
    std::fs::create_dir_all(output_dir)?;
    let outputs = result.write_outputs(output_dir, pre.dem.crs())?;
    progress.report("Delineation and HAND complete", 100);
    Ok((result, outputs))
}
