//! Soil-class segmentation of a vector layer
//!
//! Each input polygon is split along the class boundaries of a categorical
//! soil raster. Output features keep the input attributes and gain one
//! numeric class attribute.

use crate::vector::{
    intersect_polygon, layer_envelope, polygonize_classes, simplest_geometry, transform_geometry, ClassIndex,
};
use hydrorisk_core::{AttributeValue, Error, FeatureCollection, Progress, Raster, Result};
use tracing::{debug, info};

/// Parameters for [`soil_intersection`]
#[derive(Debug, Clone)]
pub struct SoilIntersectionParams {
    /// Name of the class attribute added to every output feature
    pub class_column: String,
    /// Class value treated as nodata in addition to the raster's own sentinel
    pub nodata_class: Option<f64>,
}

impl Default for SoilIntersectionParams {
    fn default() -> Self {
        Self {
            class_column: "soil_class".to_string(),
            nodata_class: Some(-9999.0),
        }
    }
}

fn class_value(class: f64) -> AttributeValue {
    if class.fract() == 0.0 && class.abs() < i64::MAX as f64 {
        AttributeValue::Int(class as i64)
    } else {
        AttributeValue::Float(class)
    }
}

/// Intersect a polygon layer with the class regions of a soil raster.
///
/// The layer is reprojected to the raster's CRS when the two differ, and
/// the result is expressed in the raster's CRS. Non-polygonal inputs and
/// pieces that only touch a class region produce nothing.
pub fn soil_intersection(
    layer: &FeatureCollection,
    soil: &Raster<f64>,
    params: &SoilIntersectionParams,
    progress: &mut Progress,
) -> Result<FeatureCollection> {
    progress.report("Loading soil classes", 10);

    let layer_crs = layer.crs_or_default();
    let soil_crs = soil.crs().cloned().unwrap_or_else(|| layer_crs.clone());
    let mut projected = FeatureCollection::with_crs(Some(soil_crs.clone()));
    for feature in layer.iter() {
        let mut f = feature.clone();
        if let Some(geom) = &feature.geometry {
            f.geometry = Some(transform_geometry(geom, &layer_crs, &soil_crs)?);
        }
        projected.push(f);
    }
    if !layer_crs.is_equivalent(&soil_crs) {
        info!("Reprojected {} features from {} to {}", projected.len(), layer_crs, soil_crs);
    }
    progress.report("Aligning coordinate systems", 20);

    let envelope = layer_envelope(&projected)
        .ok_or_else(|| Error::EmptyResult("input layer has no geometries".into()))?;
    let window = envelope
        .raster_window(soil)
        .ok_or_else(|| Error::EmptyResult("soil raster does not overlap the input layer".into()))?;
    let cropped = soil.window(window)?;
    debug!(
        "cropped soil raster to {}x{} cells at ({}, {})",
        window.rows, window.cols, window.row_off, window.col_off
    );
    progress.report("Cropping soil raster", 30);

    let classes = polygonize_classes(&cropped, params.nodata_class);
    if classes.is_empty() {
        return Err(Error::EmptyResult("soil class polygons".into()));
    }
    info!("Polygonized {} soil class regions", classes.len());
    progress.report("Polygonizing soil classes", 50);

    let index = ClassIndex::new(&classes);
    let total = projected.len();
    let mut out = FeatureCollection::with_crs(Some(soil_crs));
    for (i, feature) in projected.iter().enumerate() {
        let Some(geom) = &feature.geometry else { continue };
        for class in index.candidates(geom) {
            let piece = intersect_polygon(geom, &class.polygon);
            if piece.0.is_empty() {
                continue;
            }
            let mut f = feature.with_geometry(simplest_geometry(piece));
            f.id = None;
            f.set_property(params.class_column.clone(), class_value(class.class));
            out.push(f);
        }
        progress.report_step("Intersecting features", 50, 85, i + 1, total);
    }

    if out.is_empty() {
        return Err(Error::EmptyResult("overlapping feature/soil class pairs".into()));
    }
    info!("Soil intersection produced {} features from {} inputs", out.len(), total);
    progress.report("Soil intersection complete", 100);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Geometry};
    use geo::polygon;
    use hydrorisk_core::{Feature, GeoTransform, CRS};

    /// 4×4 cells of 10 m; left half class 1, right half class 2, bottom-right nodata
    fn soil() -> Raster<f64> {
        let data = vec![
            1.0, 1.0, 2.0, 2.0, //
            1.0, 1.0, 2.0, 2.0, //
            1.0, 1.0, 2.0, 2.0, //
            1.0, 1.0, 2.0, -9999.0,
        ];
        let mut r = Raster::from_vec(data, 4, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(31983)));
        r.set_nodata(Some(-9999.0));
        r
    }

    fn layer(poly: geo::Polygon<f64>) -> FeatureCollection {
        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(31983)));
        fc.push(Feature::new(poly).with_property("name", "plot"));
        fc
    }

    fn class_of(f: &Feature) -> i64 {
        match f.get_property("soil_class") {
            Some(AttributeValue::Int(c)) => *c,
            other => panic!("unexpected class {:?}", other),
        }
    }

    #[test]
    fn test_split_across_classes() {
        let poly = polygon![(x: 5.0, y: 25.0), (x: 35.0, y: 25.0), (x: 35.0, y: 35.0), (x: 5.0, y: 35.0)];
        let out = soil_intersection(
            &layer(poly),
            &soil(),
            &SoilIntersectionParams::default(),
            &mut Progress::silent(),
        )
        .unwrap();

        assert_eq!(out.len(), 2);
        let mut by_class: Vec<(i64, f64)> = out
            .iter()
            .map(|f| (class_of(f), f.geometry.as_ref().unwrap().unsigned_area()))
            .collect();
        by_class.sort_by_key(|(c, _)| *c);
        assert_eq!(by_class[0].0, 1);
        assert!((by_class[0].1 - 150.0).abs() < 1e-6);
        assert_eq!(by_class[1].0, 2);
        assert!((by_class[1].1 - 150.0).abs() < 1e-6);
        assert!(out.iter().all(|f| f.get_property("name") == Some(&AttributeValue::from("plot"))));
        assert!(out.crs.as_ref().unwrap().is_equivalent(&CRS::from_epsg(31983)));
    }

    #[test]
    fn test_nodata_cells_are_dropped() {
        // Entirely inside the nodata cell
        let poly = polygon![(x: 32.0, y: 2.0), (x: 38.0, y: 2.0), (x: 38.0, y: 8.0), (x: 32.0, y: 8.0)];
        let result = soil_intersection(
            &layer(poly),
            &soil(),
            &SoilIntersectionParams::default(),
            &mut Progress::silent(),
        );
        assert!(matches!(result, Err(Error::EmptyResult(_))));
    }

    #[test]
    fn test_layer_outside_raster() {
        let poly = polygon![(x: 500.0, y: 500.0), (x: 510.0, y: 500.0), (x: 510.0, y: 510.0)];
        let result = soil_intersection(
            &layer(poly),
            &soil(),
            &SoilIntersectionParams::default(),
            &mut Progress::silent(),
        );
        assert!(matches!(result, Err(Error::EmptyResult(_))));
    }

    #[test]
    fn test_points_produce_nothing() {
        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(31983)));
        fc.push(Feature::new(Geometry::Point(geo::Point::new(5.0, 5.0))));
        let result = soil_intersection(&fc, &soil(), &SoilIntersectionParams::default(), &mut Progress::silent());
        assert!(matches!(result, Err(Error::EmptyResult(_))));
    }

    #[test]
    fn test_progress_reaches_completion() {
        let poly = polygon![(x: 5.0, y: 5.0), (x: 15.0, y: 5.0), (x: 15.0, y: 15.0), (x: 5.0, y: 15.0)];
        let mut seen = Vec::new();
        {
            let mut progress = Progress::new(|_, pct| seen.push(pct));
            soil_intersection(&layer(poly), &soil(), &SoilIntersectionParams::default(), &mut progress).unwrap();
        }
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
