//! Proportional-area buffering
//!
//! Every feature of a mapped soil class is offset by the distance that
//! changes its area by the class percentage: positive percentages grow the
//! polygon, negative ones shrink it. Distances are solved numerically on an
//! equal-area plane fitted to the features of each class.

use super::weights::WeightMapping;
use crate::numeric::{brent, RootError, RootParams};
use crate::vector::{area, buffer_polygonal, buffered_area, simplest_geometry, EqualAreaFrame};
use hydrorisk_core::{Error, FeatureCollection, Progress, Result};
use geo::Geometry;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Parameters for [`proportional_buffer`]
#[derive(Debug, Clone)]
pub struct ProportionalBufferParams {
    /// Attribute holding each feature's soil class
    pub reference_column: String,
    /// Largest offset searched, in metres
    pub max_distance: f64,
    /// Absolute tolerance on the solved distance, in metres
    pub xtol: f64,
}

impl Default for ProportionalBufferParams {
    fn default() -> Self {
        Self {
            reference_column: "soil_class".to_string(),
            max_distance: 500.0,
            xtol: 0.01,
        }
    }
}

/// Per-run feature counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferSummary {
    /// Features offset to their target area
    pub processed: usize,
    /// Features of a zero-percentage class or with no area, passed through
    pub unchanged: usize,
    /// Features whose distance could not be bracketed, passed through
    pub skipped: usize,
    /// Features with no class, or a class missing from the mapping
    pub excluded: usize,
}

/// Class values of every feature, `None` where the attribute is absent or null
fn read_classes(layer: &FeatureCollection, column: &str) -> Result<Vec<Option<f64>>> {
    if !layer.has_column(column) {
        let mut available: Vec<&str> = layer
            .iter()
            .flat_map(|f| f.properties.keys().map(String::as_str))
            .collect();
        available.sort_unstable();
        available.dedup();
        return Err(Error::InvalidAttribute {
            column: column.to_string(),
            reason: format!("column not found; available columns: {}", available.join(", ")),
        });
    }

    layer
        .iter()
        .map(|f| match f.get_property(column) {
            None => Ok(None),
            Some(v) => v.as_f64().map_err(|bad| Error::InvalidAttribute {
                column: column.to_string(),
                reason: format!("non-numeric value {}", bad),
            }),
        })
        .collect()
}

/// Offset one projected geometry to `area · (1 + pct / 100)`
fn solve_offset(
    projected: &Geometry<f64>,
    original_area: f64,
    pct: f64,
    params: &ProportionalBufferParams,
) -> std::result::Result<Geometry<f64>, RootError> {
    let target = original_area * (1.0 + pct / 100.0);
    let (a, b) = if pct > 0.0 {
        (0.0, params.max_distance)
    } else {
        (-params.max_distance, 0.0)
    };
    let root_params = RootParams {
        xtol: params.xtol,
        ..RootParams::default()
    };
    let distance = brent(|d| buffered_area(projected, d) - target, a, b, root_params)?;
    debug!("offset {:.3} for target area {:.3}", distance, target);
    Ok(simplest_geometry(buffer_polygonal(projected, distance)))
}

/// Buffer each mapped feature so its area changes by its class percentage.
///
/// Classes are processed in ascending order and the output concatenates
/// them in that order, with attributes and ids preserved. Features whose
/// class is absent from `weights` are excluded from the output.
pub fn proportional_buffer(
    layer: &FeatureCollection,
    weights: &WeightMapping,
    params: &ProportionalBufferParams,
    progress: &mut Progress,
) -> Result<(FeatureCollection, BufferSummary)> {
    if !(params.max_distance.is_finite() && params.max_distance > 0.0) {
        return Err(Error::InvalidParameter {
            name: "max_distance",
            value: params.max_distance.to_string(),
            reason: "must be positive and finite".into(),
        });
    }
    if !(params.xtol.is_finite() && params.xtol > 0.0) {
        return Err(Error::InvalidParameter {
            name: "xtol",
            value: params.xtol.to_string(),
            reason: "must be positive and finite".into(),
        });
    }

    progress.report("Reading soil classes", 5);
    let classes = read_classes(layer, &params.reference_column)?;

    let mut groups: BTreeMap<i64, (f64, Vec<usize>)> = BTreeMap::new();
    for (i, class) in classes.iter().enumerate() {
        let Some(class) = *class else { continue };
        if let Some(pct) = weights.get(class) {
            groups.entry(class as i64).or_insert((pct, Vec::new())).1.push(i);
        }
    }
    let mut summary = BufferSummary {
        excluded: layer.len() - groups.values().map(|(_, idx)| idx.len()).sum::<usize>(),
        ..BufferSummary::default()
    };
    if groups.is_empty() {
        return Err(Error::EmptyResult(format!(
            "no feature has a '{}' value present in the weight mapping ({})",
            params.reference_column, weights
        )));
    }
    info!(
        "Buffering {} classes ({} features excluded)",
        groups.len(),
        summary.excluded
    );

    let crs = layer.crs_or_default();
    let total = groups.len();
    let mut out = FeatureCollection::with_crs(layer.crs.clone());

    for (step, (class, (pct, indices))) in groups.iter().enumerate() {
        progress.report_step(&format!("Buffering class {} ({:+}%)", class, pct), 10, 90, step, total);
        let frame = EqualAreaFrame::for_layer(
            &crs,
            indices.iter().filter_map(|&i| layer.features[i].geometry.as_ref()),
        );

        for &i in indices {
            let feature = &layer.features[i];
            let Some(geom) = &feature.geometry else {
                summary.unchanged += 1;
                out.push(feature.clone());
                continue;
            };
            let projected = frame.forward(geom);
            let original_area = area(&projected);
            if *pct == 0.0 || original_area <= 0.0 {
                summary.unchanged += 1;
                out.push(feature.clone());
                continue;
            }

            match solve_offset(&projected, original_area, *pct, params) {
                Ok(buffered) => {
                    summary.processed += 1;
                    out.push(feature.with_geometry(frame.inverse(&buffered)));
                }
                Err(e) => {
                    warn!("Feature {} of class {}: no buffer distance found ({}); keeping it unchanged", i, class, e);
                    summary.skipped += 1;
                    out.push(feature.clone());
                }
            }
        }
        progress.report_step(&format!("Buffered class {}", class), 10, 90, step + 1, total);
    }

    progress.report("Merging buffered classes", 95);
    info!(
        "Buffered {} features ({} unchanged, {} skipped, {} excluded)",
        summary.processed, summary.unchanged, summary.skipped, summary.excluded
    );
    progress.report("Proportional buffer complete", 100);
    Ok((out, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use hydrorisk_core::{AttributeValue, Feature, CRS};

    /// Square of `area` m² in SIRGAS 2000 / UTM 23S near São Paulo
    fn square(x0: f64, area: f64) -> Polygon<f64> {
        let s = area.sqrt();
        let y0 = 7_390_000.0;
        Polygon::new(
            LineString::from(vec![(x0, y0), (x0 + s, y0), (x0 + s, y0 + s), (x0, y0 + s), (x0, y0)]),
            vec![],
        )
    }

    fn layer(classes: &[AttributeValue]) -> FeatureCollection {
        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(31983)));
        for (i, class) in classes.iter().enumerate() {
            fc.push(
                Feature::new(square(330_000.0 + 200.0 * i as f64, 1000.0))
                    .with_property("soil_class", class.clone())
                    .with_property("id", i as i64),
            );
        }
        fc
    }

    fn geom_area(f: &Feature) -> f64 {
        area(f.geometry.as_ref().unwrap())
    }

    #[test]
    fn test_growth_reaches_target_area() {
        let weights = WeightMapping::from_pairs("1=50").unwrap();
        let (out, summary) = proportional_buffer(
            &layer(&[AttributeValue::Int(1)]),
            &weights,
            &ProportionalBufferParams::default(),
            &mut Progress::silent(),
        )
        .unwrap();

        assert_eq!(summary.processed, 1);
        let ratio = geom_area(&out.features[0]) / 1000.0;
        assert!((ratio - 1.5).abs() < 0.015, "ratio {}", ratio);
        assert_eq!(out.features[0].get_property("id"), Some(&AttributeValue::Int(0)));
    }

    #[test]
    fn test_shrink_reaches_target_area() {
        let weights = WeightMapping::from_pairs("4=-35").unwrap();
        let (out, summary) = proportional_buffer(
            &layer(&[AttributeValue::Float(4.0)]),
            &weights,
            &ProportionalBufferParams::default(),
            &mut Progress::silent(),
        )
        .unwrap();

        assert_eq!(summary.processed, 1);
        let ratio = geom_area(&out.features[0]) / 1000.0;
        assert!((ratio - 0.65).abs() < 0.0065, "ratio {}", ratio);
    }

    #[test]
    fn test_unmapped_class_is_excluded() {
        let weights = WeightMapping::from_pairs("1=50,7=0").unwrap();
        let (out, summary) = proportional_buffer(
            &layer(&[AttributeValue::Int(1), AttributeValue::Int(9), AttributeValue::Int(7), AttributeValue::Null]),
            &weights,
            &ProportionalBufferParams::default(),
            &mut Progress::silent(),
        )
        .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(summary.excluded, 2);
        assert_eq!(summary.unchanged, 1);
        // Zero percentage passes the geometry through untouched
        let neutral = &out.features[1];
        assert_eq!(neutral.get_property("soil_class"), Some(&AttributeValue::Int(7)));
        assert!((geom_area(neutral) - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_bracket_failure_keeps_feature() {
        let weights = WeightMapping::from_pairs("1=50").unwrap();
        let params = ProportionalBufferParams {
            max_distance: 0.01,
            ..ProportionalBufferParams::default()
        };
        let input = layer(&[AttributeValue::Int(1)]);
        let (out, summary) = proportional_buffer(&input, &weights, &params, &mut Progress::silent()).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 0);
        assert_eq!(out.features[0], input.features[0]);
    }

    #[test]
    fn test_no_mapped_class_is_empty() {
        let weights = WeightMapping::from_pairs("1=50").unwrap();
        let result = proportional_buffer(
            &layer(&[AttributeValue::Int(3)]),
            &weights,
            &ProportionalBufferParams::default(),
            &mut Progress::silent(),
        );
        assert!(matches!(result, Err(Error::EmptyResult(_))));
    }

    #[test]
    fn test_invalid_reference_column() {
        let weights = WeightMapping::default();
        let params = ProportionalBufferParams {
            reference_column: "texture".into(),
            ..ProportionalBufferParams::default()
        };
        match proportional_buffer(&layer(&[AttributeValue::Int(1)]), &weights, &params, &mut Progress::silent()) {
            Err(Error::InvalidAttribute { column, reason }) => {
                assert_eq!(column, "texture");
                assert!(reason.contains("soil_class"), "reason: {}", reason);
            }
            other => panic!("unexpected {:?}", other),
        }

        let bad = layer(&[AttributeValue::from("clay")]);
        assert!(matches!(
            proportional_buffer(&bad, &weights, &ProportionalBufferParams::default(), &mut Progress::silent()),
            Err(Error::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let weights = WeightMapping::from_pairs("2=35").unwrap();
        let (out, summary) = proportional_buffer(
            &layer(&[AttributeValue::from("2")]),
            &weights,
            &ProportionalBufferParams::default(),
            &mut Progress::silent(),
        )
        .unwrap();
        assert_eq!(summary.processed, 1);
        assert!(geom_area(&out.features[0]) > 1000.0);
    }
}
