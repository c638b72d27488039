//! HAND: Height Above Nearest Drainage, and the inundation it implies
//!
//! For each cell, follows the D8 flow path downstream to the first drainage
//! cell and takes the elevation difference. Drainage cells are 0; cells
//! whose path ends without meeting the network are NaN.
//!
//! A uniform water stage of `channel_depth` above the network then floods
//! every cell with `HAND < channel_depth` to depth `channel_depth - HAND`.
//!
//! Reference:
//! Nobre, A.D. et al. (2011). HAND, a new terrain descriptor using
//! SRTM-DEM. *Journal of Hydrology*, 404, 13–29.

use super::flow_accumulation::ensure_same_shape;
use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Error, Result};
use ndarray::Array2;

/// Compute Height Above Nearest Drainage.
///
/// `drainage` marks network cells with `1`. Path results are memoised, so
/// every cell is traced at most once. Negative differences (a drainage cell
/// above its contributing cell on an unconditioned DEM) clamp to 0.
pub fn hand(dem: &Raster<f64>, flow_dir: &Raster<u8>, drainage: &Raster<u8>) -> Result<Raster<f64>> {
    ensure_same_shape(dem, flow_dir)?;
    ensure_same_shape(dem, drainage)?;

    let (rows, cols) = dem.shape();
    let total = rows * cols;

    // Elevation of the drainage cell each cell reaches; None = not resolved yet
    let mut drain_elev: Vec<Option<f64>> = vec![None; total];
    // Cells already known to miss the network
    let mut dead_end = vec![false; total];

    for row in 0..rows {
        for col in 0..cols {
            if drainage.data()[(row, col)] == 1 && dem.is_valid(row, col) {
                drain_elev[row * cols + col] = Some(dem.data()[(row, col)]);
            }
        }
    }

    let mut path: Vec<usize> = Vec::new();
    for start_row in 0..rows {
        for start_col in 0..cols {
            let start_idx = start_row * cols + start_col;
            if drain_elev[start_idx].is_some() || dead_end[start_idx] || !dem.is_valid(start_row, start_col) {
                continue;
            }

            path.clear();
            let (mut cur_row, mut cur_col) = (start_row, start_col);
            let found = loop {
                let idx = cur_row * cols + cur_col;
                if let Some(elev) = drain_elev[idx] {
                    break Some(elev);
                }
                if dead_end[idx] || !dem.is_valid(cur_row, cur_col) || path.len() > total {
                    break None;
                }
                path.push(idx);

                let dir = unsafe { flow_dir.get_unchecked(cur_row, cur_col) };
                match d8::downstream(dir, cur_row, cur_col, rows, cols) {
                    Some((nr, nc)) => {
                        cur_row = nr;
                        cur_col = nc;
                    }
                    None => break None,
                }
            };

            for &idx in &path {
                match found {
                    Some(elev) => drain_elev[idx] = Some(elev),
                    None => dead_end[idx] = true,
                }
            }
        }
    }

    let mut output_data = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    for ((row, col), out) in output_data.indexed_iter_mut() {
        if let Some(se) = drain_elev[row * cols + col] {
            if dem.is_valid(row, col) {
                *out = (dem.data()[(row, col)] - se).max(0.0);
            }
        }
    }

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = output_data;
    Ok(output)
}

/// Flood depth for a water stage `channel_depth` above the drainage network.
///
/// Defined where `HAND < channel_depth` as `channel_depth - HAND`, so every
/// defined value lies in `(0, channel_depth]`; NaN elsewhere.
pub fn inundation_depth(hand: &Raster<f64>, channel_depth: f64) -> Result<Raster<f64>> {
    if !(channel_depth > 0.0 && channel_depth.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "channel_depth",
            value: channel_depth.to_string(),
            reason: "must be a positive finite depth".into(),
        });
    }

    let mut depth = hand.map(f64::NAN, |h| {
        if h < channel_depth {
            channel_depth - h
        } else {
            f64::NAN
        }
    });
    depth.set_nodata(Some(f64::NAN));
    Ok(depth)
}

/// Binary mask of flooded cells (`1` where the depth is defined)
pub fn inundation_mask(depth: &Raster<f64>) -> Raster<u8> {
    let mut mask = depth.map(0u8, |_| 1);
    mask.set_nodata(None);
    mask
}

/// File name suffix for a channel depth: `10.0 -> "10m"`, `2.5 -> "2_5m"`
pub fn depth_suffix(channel_depth: f64) -> String {
    if channel_depth.fract() == 0.0 {
        format!("{}m", channel_depth as i64)
    } else {
        format!("{}m", channel_depth.to_string().replace('.', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::{condition_dem, flow_accumulation, flow_direction, threshold, ConditionParams};
    use approx::assert_relative_eq;
    use hydrorisk_core::GeoTransform;

    /// V-shaped valley: elevation = |col - center| plus a slight south slope
    fn v_valley() -> Raster<f64> {
        let rows = 10;
        let cols = 11;
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                let cross = (col as f64 - 5.0).abs();
                let along = (rows - 1 - row) as f64 * 0.1;
                dem.set(row, col, cross + along).unwrap();
            }
        }
        dem
    }

    fn valley_hand() -> (Raster<f64>, Raster<u8>, Raster<f64>) {
        let dem = condition_dem(&v_valley(), ConditionParams::default()).unwrap();
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();
        let mask = threshold(&acc, 20.0);
        let h = hand(&dem, &fdir, &mask.cells).unwrap();
        (h, mask.cells, dem)
    }

    #[test]
    fn test_hand_zero_on_drainage_and_non_negative() {
        let (h, mask, _) = valley_hand();
        for ((row, col), &m) in mask.data().indexed_iter() {
            let v = h.get(row, col).unwrap();
            if m == 1 {
                assert_eq!(v, 0.0);
            }
            if !v.is_nan() {
                assert!(v >= 0.0);
            }
        }
    }

    #[test]
    fn test_hand_grows_away_from_channel() {
        let (h, _, _) = valley_hand();
        let near = h.get(5, 4).unwrap();
        let far = h.get(5, 2).unwrap();
        assert_relative_eq!(near, 1.0, epsilon = 1e-6);
        assert_relative_eq!(far, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unreachable_cells_are_nan() {
        // Two cells draining off the grid without touching the network
        let mut dem = Raster::from_vec(vec![2.0, 1.0, 5.0, 5.0], 2, 2).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        let fdir = Raster::from_vec(vec![d8::E, d8::NONE, d8::N, d8::N], 2, 2).unwrap();
        let drainage = Raster::from_vec(vec![0u8, 0, 0, 1], 2, 2).unwrap();

        let h = hand(&dem, &fdir, &drainage).unwrap();
        assert!(h.get(0, 0).unwrap().is_nan());
        assert!(h.get(0, 1).unwrap().is_nan());
        assert!(h.get(1, 0).unwrap().is_nan());
        assert_eq!(h.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_inundation_depth_range() {
        let (h, _, _) = valley_hand();
        let depth = inundation_depth(&h, 2.5).unwrap();
        for &d in depth.data().iter() {
            if !d.is_nan() {
                assert!(d > 0.0 && d <= 2.5, "depth {}", d);
            }
        }
        assert_relative_eq!(depth.get(5, 4).unwrap(), 1.5, epsilon = 1e-6);
        assert!(depth.get(5, 0).unwrap().is_nan());
        assert_eq!(inundation_mask(&depth).get(5, 4).unwrap(), 1);
    }

    #[test]
    fn test_inundation_rejects_non_positive_depth() {
        let h: Raster<f64> = Raster::new(2, 2);
        assert!(matches!(
            inundation_depth(&h, 0.0),
            Err(Error::InvalidParameter { name: "channel_depth", .. })
        ));
        assert!(inundation_depth(&h, -1.0).is_err());
    }

    #[test]
    fn test_depth_suffix() {
        assert_eq!(depth_suffix(10.0), "10m");
        assert_eq!(depth_suffix(2.5), "2_5m");
        assert_eq!(depth_suffix(0.75), "0_75m");
    }

    #[test]
    fn test_dimension_mismatch() {
        let dem = Raster::<f64>::new(5, 5);
        let fdir = Raster::<u8>::new(3, 3);
        let drainage = Raster::<u8>::new(5, 5);
        assert!(hand(&dem, &fdir, &drainage).is_err());
    }
}
