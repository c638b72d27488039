//! Aspect: compass bearing of steepest descent
//!
//! 0° = north, 90° = east, clockwise, in `[0, 360)`. Flat and nodata cells
//! get `-1`, which is also the output's nodata value.

use super::gradient::gradient;
use crate::maybe_rayon::*;
use hydrorisk_core::raster::Raster;
use hydrorisk_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Sentinel for flat and nodata cells
pub const FLAT_ASPECT: f64 = -1.0;

const FLAT_THRESHOLD: f64 = 1e-10;

/// Aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct Aspect;

impl Algorithm for Aspect {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aspect"
    }

    fn description(&self) -> &'static str {
        "Calculate aspect (direction of steepest descent) from a DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        aspect(&input)
    }
}

/// Calculate aspect in degrees from a DEM
pub fn aspect(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![FLAT_ASPECT; cols];
            for col in 0..cols {
                let Some((dx, dy)) = gradient(dem, row, col) else {
                    continue;
                };
                if dx.abs() < FLAT_THRESHOLD && dy.abs() < FLAT_THRESHOLD {
                    continue;
                }
                // Descent points along -∇z; bearing = atan2(east, north)
                let bearing = (-dx).atan2(-dy).to_degrees();
                row_data[col] = bearing.rem_euclid(360.0) % 360.0;
            }
            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(FLAT_ASPECT));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hydrorisk_core::GeoTransform;

    fn plane(fx: f64, fy: f64) -> Raster<f64> {
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        for row in 0..5 {
            for col in 0..5 {
                let (x, y) = dem.pixel_to_geo(col, row);
                dem.set(row, col, fx * x + fy * y).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_cardinal_bearings() {
        // Elevation rising to the south means water runs north
        assert_relative_eq!(aspect(&plane(0.0, -1.0)).unwrap().get(2, 2).unwrap(), 0.0);
        assert_relative_eq!(aspect(&plane(-1.0, 0.0)).unwrap().get(2, 2).unwrap(), 90.0);
        assert_relative_eq!(aspect(&plane(0.0, 1.0)).unwrap().get(2, 2).unwrap(), 180.0);
        assert_relative_eq!(aspect(&plane(1.0, 0.0)).unwrap().get(2, 2).unwrap(), 270.0);
    }

    #[test]
    fn test_diagonal_bearing() {
        // Falls towards the south-east
        let result = aspect(&plane(-1.0, 1.0)).unwrap();
        assert_relative_eq!(result.get(1, 1).unwrap(), 135.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_and_nodata_are_sentinel() {
        let mut dem: Raster<f64> = Raster::filled(4, 4, 3.0);
        dem.set(0, 0, f64::NAN).unwrap();
        let result = aspect(&dem).unwrap();
        assert_eq!(result.get(2, 2).unwrap(), FLAT_ASPECT);
        assert_eq!(result.get(0, 0).unwrap(), FLAT_ASPECT);
        assert_eq!(result.nodata(), Some(FLAT_ASPECT));
    }

    #[test]
    fn test_range() {
        let result = aspect(&plane(0.3, -0.7)).unwrap();
        for &v in result.data().iter() {
            assert!((0.0..360.0).contains(&v));
        }
    }
}
