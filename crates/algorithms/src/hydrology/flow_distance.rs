//! Downstream flow length to an outlet
//!
//! Distance measured along the D8 path, using the map length of each step
//! (cell width, cell height, or their hypotenuse for diagonals).

use super::watershed::Outlet;
use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Flow distance from every cell of the outlet's catchment to the outlet.
///
/// The outlet itself is 0. Cells that do not drain through the outlet are NaN.
pub fn flow_distance(flow_dir: &Raster<u8>, outlet: &Outlet) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();
    if outlet.row >= rows || outlet.col >= cols {
        return Err(Error::IndexOutOfBounds {
            row: outlet.row,
            col: outlet.col,
            rows,
            cols,
        });
    }

    let (w, h) = (flow_dir.cell_width(), flow_dir.cell_height());
    let mut distance = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    distance[(outlet.row, outlet.col)] = 0.0;
    let mut queue = VecDeque::from([(outlet.row, outlet.col)]);

    while let Some((row, col)) = queue.pop_front() {
        let here = distance[(row, col)];
        for (code, nr, nc) in d8::neighbors(row, col, rows, cols) {
            if !distance[(nr, nc)].is_nan() {
                continue;
            }
            let neighbor_dir = unsafe { flow_dir.get_unchecked(nr, nc) };
            if neighbor_dir == d8::opposite(code) {
                distance[(nr, nc)] = here + d8::step_length(neighbor_dir, w, h);
                queue.push_back((nr, nc));
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = distance;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hydrorisk_core::GeoTransform;

    fn outlet_at(row: usize, col: usize) -> Outlet {
        Outlet {
            row,
            col,
            x: col as f64 + 0.5,
            y: 0.0,
            accumulation: 0.0,
            distance: 0.0,
        }
    }

    #[test]
    fn test_straight_and_diagonal_steps() {
        // Row 0 drains east along the top; (1,0) drains NE into (0,1)
        let mut fdir = Raster::from_vec(
            vec![d8::E, d8::E, d8::NONE, d8::NE, d8::NONE, d8::NONE],
            2,
            3,
        )
        .unwrap();
        fdir.set_transform(GeoTransform::new(0.0, 2.0, 10.0, -10.0));

        let dist = flow_distance(&fdir, &outlet_at(0, 2)).unwrap();
        assert_eq!(dist.get(0, 2).unwrap(), 0.0);
        assert_relative_eq!(dist.get(0, 1).unwrap(), 10.0);
        assert_relative_eq!(dist.get(0, 0).unwrap(), 20.0);
        assert_relative_eq!(dist.get(1, 0).unwrap(), 10.0 + 200f64.sqrt(), epsilon = 1e-9);
        assert!(dist.get(1, 1).unwrap().is_nan());
        assert!(dist.get(1, 2).unwrap().is_nan());
    }

    #[test]
    fn test_outlet_outside_grid() {
        let fdir = Raster::<u8>::new(3, 3);
        assert!(flow_distance(&fdir, &outlet_at(5, 0)).is_err());
    }
}
