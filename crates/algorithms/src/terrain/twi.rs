//! Topographic Wetness Index (TWI)
//!
//! TWI = ln(a / tan(β))
//! where a = specific catchment area (flow accumulation * cell area / cell width)
//! and β = slope in radians, floored at 0.001.
//!
//! High TWI values indicate areas prone to saturation.

use crate::hydrology::flow_accumulation::ensure_same_shape;
use crate::maybe_rayon::*;
use hydrorisk_core::raster::Raster;
use hydrorisk_core::{Error, Result};
use ndarray::Array2;

/// Minimum slope to avoid ln(inf); ~0.001 rad ≈ 0.057°
const MIN_SLOPE_RAD: f64 = 0.001;

/// Compute Topographic Wetness Index
///
/// # Arguments
/// * `flow_acc` - Flow accumulation raster (cell counts, each cell counting itself)
/// * `slope_deg` - Slope in degrees
///
/// NaN where either input is nodata.
pub fn twi(flow_acc: &Raster<f64>, slope_deg: &Raster<f64>) -> Result<Raster<f64>> {
    ensure_same_shape(flow_acc, slope_deg)?;
    let (rows, cols) = flow_acc.shape();
    let contour_factor = flow_acc.transform().cell_area() / flow_acc.cell_width();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let acc = unsafe { flow_acc.get_unchecked(row, col) };
                let slp = unsafe { slope_deg.get_unchecked(row, col) };
                if acc.is_nan() || slp.is_nan() {
                    continue;
                }
                let sca = acc * contour_factor;
                let beta = slp.to_radians().max(MIN_SLOPE_RAD);
                row_data[col] = (sca / beta.tan()).ln();
            }
            row_data
        })
        .collect();

    let mut output = flow_acc.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
