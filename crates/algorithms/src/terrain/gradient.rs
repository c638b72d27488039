//! Finite-difference surface gradient
//!
//! Central differences where both neighbours along an axis are valid,
//! one-sided differences where only one is (grid borders, nodata edges),
//! and zero when neither is.

use hydrorisk_core::raster::Raster;

/// Gradient `(dz/dx, dz/dy)` at a cell in map orientation: x grows east,
/// y grows north. `None` for nodata cells.
pub(crate) fn gradient(dem: &Raster<f64>, row: usize, col: usize) -> Option<(f64, f64)> {
    if !dem.is_valid(row, col) {
        return None;
    }
    let (rows, cols) = dem.shape();
    let z = unsafe { dem.get_unchecked(row, col) };

    let neighbor = |r: Option<usize>, c: Option<usize>| -> Option<f64> {
        let (r, c) = (r?, c?);
        (r < rows && c < cols && dem.is_valid(r, c)).then(|| unsafe { dem.get_unchecked(r, c) })
    };

    let west = neighbor(Some(row), col.checked_sub(1));
    let east = neighbor(Some(row), Some(col + 1));
    let north = neighbor(row.checked_sub(1), Some(col));
    let south = neighbor(Some(row + 1), Some(col));

    let dx = axis_difference(west, z, east, dem.cell_width());
    let dy = axis_difference(south, z, north, dem.cell_height());
    Some((dx, dy))
}

/// Derivative along one axis from the low side to the high side
fn axis_difference(low: Option<f64>, z: f64, high: Option<f64>, spacing: f64) -> f64 {
    match (low, high) {
        (Some(lo), Some(hi)) => (hi - lo) / (2.0 * spacing),
        (None, Some(hi)) => (hi - z) / spacing,
        (Some(lo), None) => (z - lo) / spacing,
        (None, None) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hydrorisk_core::GeoTransform;

    #[test]
    fn test_plane_gradient_everywhere() {
        // z = 2x + 3y in map units; rows run south so y = rows - row
        let mut dem = Raster::new(4, 5);
        dem.set_transform(GeoTransform::new(0.0, 8.0, 2.0, -2.0));
        for row in 0..4 {
            for col in 0..5 {
                let (x, y) = dem.pixel_to_geo(col, row);
                dem.set(row, col, 2.0 * x + 3.0 * y).unwrap();
            }
        }
        for (row, col) in [(0, 0), (1, 2), (3, 4), (2, 0)] {
            let (dx, dy) = gradient(&dem, row, col).unwrap();
            assert_relative_eq!(dx, 2.0, epsilon = 1e-9);
            assert_relative_eq!(dy, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_nodata_uses_one_sided_difference() {
        let mut dem = Raster::from_vec(vec![0.0, 1.0, f64::NAN], 1, 3).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        let (dx, dy) = gradient(&dem, 0, 1).unwrap();
        assert_relative_eq!(dx, 1.0);
        assert_eq!(dy, 0.0);
        assert!(gradient(&dem, 0, 2).is_none());
    }
}
