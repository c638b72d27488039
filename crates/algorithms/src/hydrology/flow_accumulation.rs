//! Flow accumulation algorithm
//!
//! Counts the cells draining through each cell, the cell itself included,
//! by a topological (Kahn) traversal of the D8 graph from the headwaters.

use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Error, Result};
use ndarray::Array2;
use tracing::debug;

/// Check that two grids share a shape
pub(crate) fn ensure_same_shape<A, B>(expected: &Raster<A>, actual: &Raster<B>) -> Result<()>
where
    A: hydrorisk_core::RasterElement,
    B: hydrorisk_core::RasterElement,
{
    let (er, ec) = expected.shape();
    let (ar, ac) = actual.shape();
    if (er, ec) != (ar, ac) {
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    Ok(())
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// `dem` supplies the validity mask: nodata cells are NaN in the output and
/// neither receive nor pass flow. Every valid cell counts itself, so a
/// headwater cell has accumulation 1 and values never decrease downstream.
pub fn flow_accumulation(flow_dir: &Raster<u8>, dem: &Raster<f64>) -> Result<Raster<f64>> {
    ensure_same_shape(flow_dir, dem)?;
    let (rows, cols) = flow_dir.shape();

    let target = |row: usize, col: usize| -> Option<(usize, usize)> {
        let dir = unsafe { flow_dir.get_unchecked(row, col) };
        d8::downstream(dir, row, col, rows, cols).filter(|&(nr, nc)| dem.is_valid(nr, nc))
    };

    // In-degree: how many valid cells drain INTO each cell
    let mut in_degree = Array2::<u8>::zeros((rows, cols));
    let mut accumulation = Array2::<f64>::from_elem((rows, cols), f64::NAN);

    for row in 0..rows {
        for col in 0..cols {
            if !dem.is_valid(row, col) {
                continue;
            }
            accumulation[(row, col)] = 1.0;
            if let Some(next) = target(row, col) {
                in_degree[next] += 1;
            }
        }
    }

    let mut queue: Vec<(usize, usize)> = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if dem.is_valid(row, col) && in_degree[(row, col)] == 0 {
                queue.push((row, col));
            }
        }
    }

    let mut processed = 0usize;
    while let Some((row, col)) = queue.pop() {
        processed += 1;
        let Some(next) = target(row, col) else {
            continue;
        };

        accumulation[next] += accumulation[(row, col)];
        in_degree[next] -= 1;
        if in_degree[next] == 0 {
            queue.push(next);
        }
    }

    debug!("accumulated {} cells", processed);

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = accumulation;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction;
    use hydrorisk_core::GeoTransform;

    fn dem_from(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flow_accumulation_linear() {
        // 1x5 strip sloping east
        let dem = dem_from(1, 5, |_, col| (5 - col) as f64);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();

        for col in 0..5 {
            assert_eq!(acc.get(0, col).unwrap(), (col + 1) as f64);
        }
    }

    #[test]
    fn test_flow_accumulation_convergent() {
        //  5 5 5
        //  5 1 5
        //  5 5 5
        let dem = dem_from(3, 3, |r, c| if (r, c) == (1, 1) { 1.0 } else { 5.0 });
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();

        assert_eq!(acc.get(1, 1).unwrap(), 9.0);
        assert_eq!(acc.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_nodata_is_nan_and_blocks_flow() {
        let mut dem = dem_from(1, 5, |_, col| (5 - col) as f64);
        dem.set_nodata(Some(-9999.0));
        dem.set(0, 2, -9999.0).unwrap();
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();

        assert!(acc.get(0, 2).unwrap().is_nan());
        assert_eq!(acc.get(0, 1).unwrap(), 2.0);
        assert_eq!(acc.get(0, 3).unwrap(), 1.0);
        assert_eq!(acc.get(0, 4).unwrap(), 2.0);
    }

    #[test]
    fn test_non_decreasing_downstream() {
        let dem = dem_from(8, 8, |r, c| ((r as f64 - 7.0).powi(2) + (c as f64 - 3.5).abs()) * 3.0);
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir, &dem).unwrap();
        for row in 0..8 {
            for col in 0..8 {
                let code = fdir.get(row, col).unwrap();
                if let Some((nr, nc)) = d8::downstream(code, row, col, 8, 8) {
                    assert!(acc.get(nr, nc).unwrap() > acc.get(row, col).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let dem = dem_from(3, 3, |_, _| 1.0);
        let fdir: Raster<u8> = Raster::new(3, 4);
        assert!(matches!(
            flow_accumulation(&fdir, &dem),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
