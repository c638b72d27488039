//! Slope from a DEM
//!
//! `slope = atan(|∇z|)` using the finite-difference gradient in
//! [`super::gradient`], with the actual x and y resolution.

use super::gradient::gradient;
use crate::maybe_rayon::*;
use hydrorisk_core::raster::Raster;
use hydrorisk_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope (steepest rate of change of elevation) from a DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        slope(&input)
    }
}

/// Slope in degrees (0-90) from a DEM. Nodata cells are NaN.
pub fn slope(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let Some((dx, dy)) = gradient(dem, row, col) else {
                    continue;
                };
                row_data[col] = dx.hypot(dy).atan().to_degrees();
            }
            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hydrorisk_core::GeoTransform;

    fn ramp(cell: f64) -> Raster<f64> {
        // Rises 1 unit per cell to the east
        let mut dem = Raster::new(6, 6);
        dem.set_transform(GeoTransform::new(0.0, 6.0 * cell, cell, -cell));
        for row in 0..6 {
            for col in 0..6 {
                dem.set(row, col, col as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_slope_flat() {
        let mut dem: Raster<f64> = Raster::filled(5, 5, 100.0);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        let result = slope(&dem).unwrap();
        for &v in result.data().iter() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_slope_45_degrees_including_borders() {
        let result = slope(&ramp(1.0)).unwrap();
        assert_relative_eq!(result.get(3, 3).unwrap(), 45.0, epsilon = 1e-9);
        assert_relative_eq!(result.get(0, 0).unwrap(), 45.0, epsilon = 1e-9);
        assert_relative_eq!(result.get(5, 5).unwrap(), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_slope_uses_cell_size() {
        let result = slope(&ramp(10.0)).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.1f64.atan().to_degrees(), epsilon = 1e-9);
    }

    #[test]
    fn test_slope_nodata() {
        let mut dem = ramp(1.0);
        dem.set(2, 2, f64::NAN).unwrap();
        let result = slope(&dem).unwrap();
        assert!(result.get(2, 2).unwrap().is_nan());
        assert_relative_eq!(result.get(2, 1).unwrap(), 45.0, epsilon = 1e-9);
    }
}
