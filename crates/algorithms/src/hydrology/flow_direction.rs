//! D8 flow direction algorithm
//!
//! Each cell drains to the neighbour with the steepest downhill gradient,
//! `(z - z_n) / distance`, where distance uses the actual cell width, height
//! and their diagonal. Codes follow [`hydrorisk_core::raster::d8`]:
//!
//! ```text
//!   32  64  128
//!   16   0    1
//!    8   4    2
//! ```
//!
//! Ties resolve in the order N, NE, E, SE, S, SW, W, NW; a cell with no
//! strictly lower valid neighbour gets `0`.

use crate::maybe_rayon::*;
use hydrorisk_core::raster::{d8, Raster};
use hydrorisk_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Calculate D8 flow direction from a conditioned DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// Calculate D8 flow direction from a DEM.
///
/// The input should be conditioned (see [`condition_dem`](super::condition_dem));
/// otherwise pits and flats come out as `0`. Nodata cells are `0` too.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let cell_width = dem.cell_width();
    let cell_height = dem.cell_height();

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![d8::NONE; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                if !dem.is_valid(row, col) {
                    continue;
                }
                let center = unsafe { dem.get_unchecked(row, col) };

                let mut max_drop = 0.0_f64;
                let mut best_dir = d8::NONE;

                for (code, nr, nc) in d8::neighbors(row, col, rows, cols) {
                    if !dem.is_valid(nr, nc) {
                        continue;
                    }
                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    let distance = d8::step_length(code, cell_width, cell_height);
                    let drop = (center - neighbor) / distance;

                    if drop > max_drop {
                        max_drop = drop;
                        best_dir = code;
                    }
                }

                *out = best_dir;
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<u8>(rows, cols);
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
